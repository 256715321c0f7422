//! Error type shared by all provisioning operations.

extern crate custom_error;
use custom_error::custom_error;

custom_error! {
    /// Why a provisioning step, or the run as a whole, could not complete.
    pub ProvisionError
    /// The program could not be started at all (not installed, not executable).
    Spawn{
        /// Program as it was passed to exec.
        program: String,
        /// OS error from the exec attempt.
        source: std::io::Error
    } = "Failed to launch {program}: {source}",
    /// The program ran and exited non-zero, or was killed.
    CommandFailure{
        /// Full command line.
        command: String,
        /// Exit code, or `signal`.
        code: String
    } = "Command '{command}' failed with exit status {code}",
    /// `--root` does not name a directory.
    InvalidRoot{
        /// Path as given.
        path: String
    } = "Filesystem root is not a directory: {path}",
}

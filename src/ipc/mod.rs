//! Cross-context messaging: wire vocabulary, framing and socket location.

pub mod codec;
pub mod protocol;

use std::path::PathBuf;

/// Socket file name under the runtime directory.
const SOCKET_NAME: &str = "background.sock";

/// `$XDG_RUNTIME_DIR/smartswap/background.sock`, or `None` when the
/// runtime directory is not set.
pub fn socket_path() -> Option<PathBuf> {
    let runtime = std::env::var_os("XDG_RUNTIME_DIR").filter(|v| !v.is_empty())?;
    Some(PathBuf::from(runtime).join("smartswap").join(SOCKET_NAME))
}

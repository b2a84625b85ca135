//! SIGTERM/SIGINT trip a process-wide cancel token.

use std::sync::OnceLock;

use sentinel_core::CancelToken;

static TOKEN: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn on_signal(_signal: libc::c_int) {
    // Only an atomic store happens here.
    if let Some(token) = TOKEN.get() {
        token.cancel();
    }
}

/// Installs the handlers once and returns the token they trip.
pub fn install() -> CancelToken {
    let token = TOKEN.get_or_init(CancelToken::new).clone();
    #[cfg(unix)]
    {
        let handler = on_signal as extern "C" fn(libc::c_int) as libc::sighandler_t;
        unsafe {
            libc::signal(libc::SIGTERM, handler);
            libc::signal(libc::SIGINT, handler);
        }
    }
    token
}

/// Number of bytes on each side of a position captured by [`context_dump`].
pub(crate) const CONTEXT_RADIUS: usize = 64;

/// Renders the bytes around `pos` for diagnostics, marking the position with `>>>`.
///
/// # Example
///
/// ```
/// use graphwire::util::context_dump;
///
/// let dump = context_dump(b"{\"a\":1,\"b\":}", 11);
///
/// assert_eq!(dump, "{\"a\":1,\"b\":>>>}");
/// ```
pub fn context_dump(data: &[u8], pos: usize) -> String {
    let pos = pos.min(data.len());
    let start = pos.saturating_sub(CONTEXT_RADIUS);
    let end = (pos + CONTEXT_RADIUS).min(data.len());
    format!(
        "{}>>>{}",
        String::from_utf8_lossy(&data[start..pos]),
        String::from_utf8_lossy(&data[pos..end])
    )
}

#[macro_export]
/// Helper macro to make implementing `From` easier.
macro_rules! from_fn {
    ($to:ty, $from:ty, $fn:expr) => {
        impl From<$from> for $to {
            fn from(f: $from) -> $to { $fn(f) }
        }
    };
}

#[macro_export]
/// Helper macro to make implementing `From` easier.
macro_rules! from_as {
    ($to:tt, $from:ty, $as:ty) => {
        impl From<$from> for $to {
            fn from(f: $from) -> $to { $to::from(f as $as) }
        }
    };
}

#[macro_export]
/// Helper macro to implement `TryFrom` for the payload of a single enum variant. The value is
/// handed back unchanged when it holds another variant.
macro_rules! try_from_ctor {
    ($from:tt, $to:ty, $ctor:ident) => {
        impl std::convert::TryFrom<$from> for $to {
            type Error = $from;

            fn try_from(f: $from) -> std::result::Result<$to, $from> {
                match f {
                    $from::$ctor(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}

#[macro_export]
/// Lazily parses an environment variable into a specified type, falling back to a default
/// when the variable is unset or does not parse.
macro_rules! lazy_env_parse {
    ($key:expr, $t:ty, $default:expr) => {
        once_cell::sync::Lazy::new(|| {
            std::env::var($key)
                .ok()
                .and_then(|s| s.parse::<$t>().ok())
                .unwrap_or($default)
        })
    };
}

//! # Utility Functions Module
//!
//! Small helpers for building external tool command lines.

use std::ffi::{OsStr, OsString};

/// Macro for building argv lists from mixed item types.
///
/// Items do not need to share a type, so literals, owned strings and paths
/// can be mixed freely. Paths stay `OsString`, so non UTF-8 file names reach
/// the tool untouched.
///
/// # Example
/// ```rust
/// use std::path::Path;
/// use imgcompress::args;
///
/// let quality = 85;
/// let args = args!["-quality", quality.to_string(), "-outfile", Path::new("out.jpg")];
/// assert_eq!(args.len(), 4);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$(::std::convert::AsRef::<::std::ffi::OsStr>::as_ref(&$item).to_os_string()),*]
    };
}

/// Renders an argv list for log output.
pub fn display_args(program: &OsStr, args: &[OsString]) -> String {
    let mut rendered = program.to_string_lossy().into_owned();
    for arg in args {
        rendered.push(' ');
        rendered.push_str(&arg.to_string_lossy());
    }
    rendered
}

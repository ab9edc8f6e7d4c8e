pub mod context;
pub mod flush;
pub mod purge;
pub mod record;
pub mod run;
pub mod status;

use siteline_core::record::PageId;

/// Parses a `key=value` argument.
pub fn parse_field(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", arg)),
    }
}

/// Reads `--page`: URL paths map to their page id, anything else is taken as is.
pub fn page_arg(arg: &str) -> PageId {
    if arg.starts_with('/') {
        PageId::from_path(arg)
    } else {
        PageId::new(arg)
    }
}

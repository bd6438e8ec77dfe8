pub fn print_error(err: anyhow::Error) {
    log::error!("{:?}", err);
}

/// Format an error together with its chain of causes on a single line.
pub fn format_error(err: &anyhow::Error) -> String {
    format!("{:#}", err)
}

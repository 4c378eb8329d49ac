//! `aws s3 ls`

/// Directories (`PRE <name>/` rows) under `base_path`, as `<base_path>/<name>`.
pub fn parse_directory_listing(base_path: &str, output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("PRE "))
        .map(|name| format!("{}/{}", base_path, name.trim_end_matches('/')))
        .collect()
}

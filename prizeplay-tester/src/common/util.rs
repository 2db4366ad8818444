use std::path::PathBuf;

pub fn split_csv(s: &str) -> Vec<String> {
    s.split(',')
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty())
        .collect()
}

/// Path under the system temp dir that no other run will reuse.
pub fn unique_temp_path(label: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "prizeplay-{label}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_csv_trims_and_filters() {
        let parts = split_csv(" wheel, ,slots,  dice ");
        assert_eq!(parts, vec!["wheel", "slots", "dice"]);
    }

    #[test]
    fn temp_paths_do_not_collide() {
        assert_ne!(unique_temp_path("a"), unique_temp_path("a"));
    }
}

use crate::models::TabCapture;

/// Collapse runs of consecutive entries with the same URL into the first of the run.
/// Non-adjacent repeats are kept: this feeds display counts and resume, not storage.
pub fn deduplicate_tabs(tab_list: &[TabCapture]) -> Vec<&TabCapture> {
    let mut deduplicated: Vec<&TabCapture> = Vec::with_capacity(tab_list.len());
    for tab in tab_list {
        if deduplicated.last().map_or(true, |prev| prev.url != tab.url) {
            deduplicated.push(tab);
        }
    }
    deduplicated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tabs(urls: &[&str]) -> Vec<TabCapture> {
        urls.iter()
            .map(|url| TabCapture::new(*url, None, Utc::now()))
            .collect()
    }

    #[test]
    fn collapses_only_adjacent_repeats() {
        let list = tabs(&["a", "a", "b", "a"]);
        let urls: Vec<&str> = deduplicate_tabs(&list)
            .into_iter()
            .map(|tab| tab.url.as_str())
            .collect();
        assert_eq!(urls, vec!["a", "b", "a"]);
    }

    #[test]
    fn keeps_first_of_each_run() {
        let list = tabs(&["a", "a", "a"]);
        let deduped = deduplicate_tabs(&list);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].id, list[0].id);
    }

    #[test]
    fn empty_list_stays_empty() {
        assert!(deduplicate_tabs(&[]).is_empty());
    }
}

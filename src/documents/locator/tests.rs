use super::*;

const BASE: &str = "https://aframe.io/docs/master/";

#[test]
fn strips_documentation_root() {
    assert_eq!(
        resolve_source_url("docs/components/camera.md", BASE, "docs/"),
        "https://aframe.io/docs/master/components/camera.md"
    );
}

#[test]
fn path_without_prefix_is_appended_unchanged() {
    assert_eq!(
        resolve_source_url("guides/intro.md", BASE, "docs/"),
        "https://aframe.io/docs/master/guides/intro.md"
    );
}

#[test]
fn only_leading_prefix_is_removed() {
    assert_eq!(
        resolve_source_url("docs/docs/nested.md", BASE, "docs/"),
        "https://aframe.io/docs/master/docs/nested.md"
    );
}

#[test]
fn empty_prefix_keeps_path() {
    assert_eq!(
        resolve_source_url("docs/a.md", BASE, ""),
        "https://aframe.io/docs/master/docs/a.md"
    );
}

#[test]
fn resolution_is_stable_across_calls() {
    let locator = SourceLocator::new(BASE, "docs/");
    let first = locator.locate("docs/a.md", "");
    let second = locator.locate("docs/a.md", "");
    assert_eq!(first, second);
}

#[test]
fn front_matter_path_ignored_by_default() {
    let locator = SourceLocator::new(BASE, "docs/");
    assert_eq!(
        locator.locate("docs/components/foo.md", "components/foo"),
        "https://aframe.io/docs/master/components/foo.md"
    );
}

#[test]
fn front_matter_path_used_when_preferred() {
    let locator = SourceLocator::new(BASE, "docs/").with_front_matter_preference(true);
    assert_eq!(
        locator.locate("docs/components/foo.md", "components/foo"),
        "https://aframe.io/docs/master/components/foo"
    );

    // Falls back to the repository path when the document had no usable header
    assert_eq!(
        locator.locate("docs/components/bar.md", ""),
        "https://aframe.io/docs/master/components/bar.md"
    );
}

#[test]
fn built_from_docs_config() {
    let config = DocsConfig::default();
    let locator = SourceLocator::from_config(&config);
    assert_eq!(locator.base_url(), config.source_url);
}

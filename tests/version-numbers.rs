#[test]
fn readme_dependency_version_matches_cargo_toml() {
    version_sync::assert_markdown_deps_updated!("README.md");
}

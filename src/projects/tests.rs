use super::*;
use std::fs;
use tempfile::TempDir;

fn write_project(root: &Path, name: &str, content: &str) {
    let projects = root.join(PROJECTS_DIR);
    fs::create_dir_all(&projects).expect("can create projects dir");
    fs::write(projects.join(name), content).expect("can write project file");
}

fn loaded_detector(root: &Path) -> ProjectDetector {
    let mut detector = ProjectDetector::new(root);
    detector.load();
    detector
}

#[test]
fn keyword_generation_variants() {
    let keywords = generate_keywords("lol-matchmaking-fazenda");

    assert_eq!(
        keywords,
        vec![
            "lol-matchmaking-fazenda",
            "lol matchmaking fazenda",
            "lolmatchmakingfazenda",
            "lol",
            "matchmaking",
            "fazenda",
        ]
    );
}

#[test]
fn keyword_generation_skips_short_tokens() {
    let keywords = generate_keywords("api-v2-gateway");

    // "v2" has only two characters
    assert!(!keywords.contains(&"v2".to_string()));
    assert!(keywords.contains(&"api".to_string()));
    assert!(keywords.contains(&"gateway".to_string()));
}

#[test]
fn keyword_generation_deduplicates() {
    let keywords = generate_keywords("solo");

    // All variants collapse to the same string for a single-token name
    assert_eq!(keywords, vec!["solo"]);
}

#[test]
fn catalog_skips_alternate_language_variants() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "app-legal.md", "conteúdo");
    write_project(temp.path(), "app-legal-english.md", "content");

    let detector = loaded_detector(temp.path());
    assert_eq!(detector.len(), 1);
}

#[test]
fn missing_projects_dir_yields_empty_catalog() {
    let temp = TempDir::new().expect("can create temp dir");
    let detector = loaded_detector(temp.path());

    assert!(detector.is_empty());
    assert_eq!(detector.detect("qualquer coisa"), None);
}

#[test]
fn load_is_idempotent() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "first.md", "a");
    write_project(temp.path(), "second.md", "b");

    let mut detector = ProjectDetector::new(temp.path());
    detector.load();
    detector.load();

    assert_eq!(detector.len(), 2);
}

#[test]
fn detects_exact_substring_mention() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(
        temp.path(),
        "lol-matchmaking-fazenda.md",
        "Sistema de matchmaking para LoL.",
    );

    let detector = loaded_detector(temp.path());
    let result = detector
        .detect("me fala sobre o projeto lol matchmaking fazenda")
        .expect("project should be detected");

    assert!(result.starts_with("--- Projeto: lol-matchmaking-fazenda ---\n"));
    assert!(result.contains("Sistema de matchmaking"));
}

#[test]
fn detects_single_token_mention() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "lol-matchmaking-fazenda.md", "descrição");

    let detector = loaded_detector(temp.path());
    assert!(detector.detect("como funciona o matchmaking?").is_some());
}

#[test]
fn fuzzy_accepts_two_edits_on_long_keyword() {
    // "matchmaking" (11 chars) with two substitutions
    let words = vec!["metchmaling"];
    assert!(fuzzy_match("matchmaking", &words));
}

#[test]
fn fuzzy_rejects_four_edits_on_long_keyword() {
    // "matchmaking" with four substitutions
    let words = vec!["mxtchzawiqg"];
    assert!(!fuzzy_match("matchmaking", &words));
}

#[test]
fn fuzzy_skips_short_keywords_and_tokens() {
    assert!(!fuzzy_match("lol", &["lol"]));
    assert!(!fuzzy_match("fazenda", &["fa", "de"]));
}

#[test]
fn detects_misspelled_mention_via_fuzzy() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "lol-matchmaking-fazenda.md", "descrição");

    let detector = loaded_detector(temp.path());
    assert!(detector.detect("me explica o metchmaling do lol").is_some());
}

#[test]
fn unrelated_query_detects_nothing() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "lol-matchmaking-fazenda.md", "descrição");

    let detector = loaded_detector(temp.path());
    assert_eq!(detector.detect("qual o seu endereço?"), None);
}

#[test]
fn first_entry_in_sorted_order_wins() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "alpha-dashboard.md", "primeiro");
    write_project(temp.path(), "beta-dashboard.md", "segundo");

    let detector = loaded_detector(temp.path());
    let result = detector
        .detect("me mostra o dashboard")
        .expect("shared keyword should match");

    // Both entries carry the "dashboard" keyword; iteration order decides
    assert!(result.starts_with("--- Projeto: alpha-dashboard ---"));
}

#[test]
fn detection_is_case_insensitive() {
    let temp = TempDir::new().expect("can create temp dir");
    write_project(temp.path(), "lol-matchmaking-fazenda.md", "descrição");

    let detector = loaded_detector(temp.path());
    assert!(detector.detect("ME FALA DO LOL MATCHMAKING").is_some());
}

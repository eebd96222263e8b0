//! Path-template matching tests.

use spec_integrity::services::{EndpointMatcher, strip_path_params};

#[test]
fn test_param_matches_exactly_one_segment() {
    let matcher = EndpointMatcher::compile("/orders/{id}/items").unwrap();

    assert!(matcher.test("/orders/42/items"));
    assert!(matcher.test("/orders/abc-123/items"));
    assert!(!matcher.test("/orders/42/items/5"));
    assert!(!matcher.test("/orders//items"));
    assert!(!matcher.test("/orders/4/2/items"));
    assert_eq!(matcher.template(), "/orders/{id}/items");
}

#[test]
fn test_match_is_anchored() {
    let matcher = EndpointMatcher::compile("/users").unwrap();

    assert!(matcher.test("/users"));
    assert!(!matcher.test("/users/1"));
    assert!(!matcher.test("/api/users"));
}

#[test]
fn test_wildcard_matches_any_suffix() {
    let matcher = EndpointMatcher::compile("/files/*").unwrap();

    assert!(matcher.test("/files/"));
    assert!(matcher.test("/files/a/b/c.txt"));
    assert!(!matcher.test("/file"));
}

#[test]
fn test_query_and_fragment_are_ignored() {
    let matcher = EndpointMatcher::compile("/users/{id}").unwrap();

    assert!(matcher.test("/users/7?expand=roles"));
    assert!(matcher.test("/users/7#profile"));
}

#[test]
fn test_template_matches_itself() {
    let matcher = EndpointMatcher::compile("/users/{id}").unwrap();
    assert!(matcher.test("/users/{id}"));
}

#[test]
fn test_regex_characters_are_literal() {
    let matcher = EndpointMatcher::compile("/search(v2)+").unwrap();

    assert!(matcher.test("/search(v2)+"));
    assert!(!matcher.test("/searchv2"));
}

#[test]
fn test_strip_path_params() {
    assert_eq!(strip_path_params("/users/{id}/roles/{roleId}"), "/users//roles/");
}

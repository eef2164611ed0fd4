use super::Error;

#[test]
fn circular_dependency_renders_path() {
    let err = Error::CircularDependency {
        path: vec!["a".into(), "c".into(), "b".into(), "a".into()],
    };
    assert_eq!(err.to_string(), "Circular dependency found: a <- c <- b <- a");
}

#[test]
fn unknown_provider_renders_chain() {
    let err = Error::UnknownProvider {
        path: vec!["missingProvider".into(), "missing".into()],
    };
    assert_eq!(err.to_string(), "Unknown provider: missingProvider <- missing");
}

#[test]
fn digest_limit_includes_ttl() {
    assert_eq!(
        Error::DigestLimit { ttl: 10 }.to_string(),
        "10 digest limit reached"
    );
}

#[test]
fn host_errors_render_verbatim() {
    assert_eq!(Error::host("boom").to_string(), "boom");
}

//! Endpoint templates for metric labels.
//!
//! Raw request paths carry resource identifiers. Used verbatim as a label
//! value every identifier would open a new series, so paths are collapsed
//! into route-shaped templates before they reach a sink:
//!
//! - `/api/v1/users/12345/profile` → `api/v1/users/<int>/profile`
//! - `/orders/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6` → `orders/<uuid>`
//! - `/` → `/`

use uuid::Uuid;

/// Template used when the trimmed path is empty.
pub const ROOT_TEMPLATE: &str = "/";

/// Replaces segments that are signed or unsigned base-10 integers.
pub const INT_PLACEHOLDER: &str = "<int>";

/// Replaces segments in canonical 8-4-4-4-12 UUID form.
pub const UUID_PLACEHOLDER: &str = "<uuid>";

/// Classification of a single path segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Integer,
    Uuid,
    Literal(&'a str),
}

impl<'a> Segment<'a> {
    pub fn classify(raw: &'a str) -> Self {
        if is_integer(raw) {
            Segment::Integer
        } else if is_uuid(raw) {
            Segment::Uuid
        } else {
            Segment::Literal(raw)
        }
    }

    /// The text this segment contributes to a template.
    pub fn as_str(&self) -> &'a str {
        match self {
            Segment::Integer => INT_PLACEHOLDER,
            Segment::Uuid => UUID_PLACEHOLDER,
            Segment::Literal(raw) => raw,
        }
    }
}

/// Normalize a raw URL path into an endpoint template.
///
/// Leading and trailing `/` are trimmed, the rest is split on `/` and every
/// segment is classified independently. Segment count and order are
/// preserved; only integer and UUID segments are rewritten.
///
/// ```
/// use http_meter::endpoint::normalize;
///
/// assert_eq!(normalize("/api/v1/users/12345/profile"), "api/v1/users/<int>/profile");
/// assert_eq!(normalize("/api/v1/users/"), "api/v1/users");
/// assert_eq!(normalize("/"), "/");
/// ```
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return ROOT_TEMPLATE.to_string();
    }

    let mut template = String::with_capacity(trimmed.len());
    for (i, raw) in trimmed.split('/').enumerate() {
        if i > 0 {
            template.push('/');
        }
        template.push_str(Segment::classify(raw).as_str());
    }
    template
}

fn is_integer(s: &str) -> bool {
    let digits = s.strip_prefix(|c| c == '+' || c == '-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

// `Uuid::try_parse` also accepts the simple, braced and URN forms; only the
// 36-char hyphenated form counts here.
fn is_uuid(s: &str) -> bool {
    s.len() == 36 && Uuid::try_parse(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_integer_segments() {
        assert_eq!(
            normalize("/api/v1/users/12345/profile"),
            "api/v1/users/<int>/profile"
        );
        assert_eq!(normalize("/items/-7"), "items/<int>");
        assert_eq!(normalize("/items/+42/details"), "items/<int>/details");
        assert_eq!(normalize("/items/0"), "items/<int>");
        // Longer than any machine integer, still an identifier.
        assert_eq!(
            normalize("/ledger/123456789012345678901234567890"),
            "ledger/<int>"
        );
    }

    #[test]
    fn test_normalize_uuid_segments() {
        assert_eq!(
            normalize("/orders/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6"),
            "orders/<uuid>"
        );
        assert_eq!(
            normalize("/jobs/ABCDEF12-3456-7890-ABCD-EF1234567890/status"),
            "jobs/<uuid>/status"
        );
    }

    #[test]
    fn test_normalize_replaces_every_dynamic_segment() {
        assert_eq!(
            normalize("/tenants/9/orders/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6/lines/3"),
            "tenants/<int>/orders/<uuid>/lines/<int>"
        );
    }

    #[test]
    fn test_normalize_root() {
        assert_eq!(normalize("/"), ROOT_TEMPLATE);
        assert_eq!(normalize(""), ROOT_TEMPLATE);
        assert_eq!(normalize("///"), ROOT_TEMPLATE);
    }

    #[test]
    fn test_normalize_trailing_slash() {
        assert_eq!(normalize("/api/v1/users/"), normalize("/api/v1/users"));
        assert_eq!(normalize("/api/v1/users/"), "api/v1/users");
    }

    #[test]
    fn test_normalize_literals_untouched() {
        assert_eq!(normalize("/api/v1/health"), "api/v1/health");
        assert_eq!(normalize("/v2/12a45/abc"), "v2/12a45/abc");
        assert_eq!(normalize("/a//b"), "a//b");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for path in [
            "/",
            "/api/v1/users/12345/profile",
            "/orders/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6",
            "/x/-1/y/",
            "/plain/route",
        ] {
            let once = normalize(path);
            assert_eq!(normalize(&once), once, "path {path}");
        }
    }

    #[test]
    fn test_normalize_preserves_segment_count() {
        let path = "/a/1/b/1ca0d4c6-796e-4a1c-a6a0-95fb0f4033b6/c";
        let template = normalize(path);
        assert_eq!(
            template.split('/').count(),
            path.trim_matches('/').split('/').count()
        );
    }

    #[test]
    fn test_classify_integer() {
        assert_eq!(Segment::classify("12345"), Segment::Integer);
        assert_eq!(Segment::classify("-7"), Segment::Integer);
        assert_eq!(Segment::classify("-"), Segment::Literal("-"));
        assert_eq!(Segment::classify("+"), Segment::Literal("+"));
        assert_eq!(Segment::classify("--7"), Segment::Literal("--7"));
        assert_eq!(Segment::classify("1.5"), Segment::Literal("1.5"));
        assert_eq!(Segment::classify(""), Segment::Literal(""));
    }

    #[test]
    fn test_classify_uuid() {
        assert_eq!(
            Segment::classify("550e8400-e29b-41d4-a716-446655440000"),
            Segment::Uuid
        );
        // Non-canonical spellings stay literal.
        assert!(matches!(
            Segment::classify("550e8400e29b41d4a716446655440000"),
            Segment::Literal(_)
        ));
        assert!(matches!(
            Segment::classify("{550e8400-e29b-41d4-a716-446655440000}"),
            Segment::Literal(_)
        ));
        assert!(matches!(
            Segment::classify("550e8400-e29b-41d4-a716-44665544000g"),
            Segment::Literal(_)
        ));
        assert!(matches!(
            Segment::classify("550e8400-e29b-41d4-a716-44665544000"),
            Segment::Literal(_)
        ));
    }

    #[test]
    fn test_placeholders_are_literals() {
        assert_eq!(
            Segment::classify(INT_PLACEHOLDER),
            Segment::Literal(INT_PLACEHOLDER)
        );
        assert_eq!(
            Segment::classify(UUID_PLACEHOLDER),
            Segment::Literal(UUID_PLACEHOLDER)
        );
    }

    #[test]
    fn test_fresh_uuid_collapses() {
        let path = format!("/sessions/{}", Uuid::new_v4());
        assert_eq!(normalize(&path), "sessions/<uuid>");
    }
}

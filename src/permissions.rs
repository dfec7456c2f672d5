use crate::error::ApiError;
use crate::models::User;

/// Denial detail used when a composed policy list rejects a request; no
/// single policy owns the refusal, so the framework default is surfaced.
pub const DEFAULT_DETAIL: &str = "You do not have permission to perform this action.";

/// Detail for requests that require an identity but carry none.
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

/// Policy
///
/// Single-responsibility permission predicates, evaluated per-request and,
/// where an owner is known, per-object. Keeping each predicate tiny and
/// composing them with an ordered OR avoids duplicating role logic across
/// the five resource controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// The caller is the object's author.
    IsAuthor,
    /// The caller holds the moderator role (superusers qualify).
    IsModerator,
    /// The caller has admin rights (staff flag, admin role, or superuser).
    IsAdmin,
    /// Safe methods pass; mutations require admin rights.
    IsAdminOrReadOnly,
    /// The caller is a superuser.
    IsSuperuser,
}

impl Policy {
    /// The human-readable reason attached to a 403 when this policy is the
    /// sole gate for an operation.
    pub fn message(&self) -> &'static str {
        match self {
            Policy::IsAuthor => DEFAULT_DETAIL,
            Policy::IsModerator => "Moderator rights are required for this action.",
            Policy::IsAdmin | Policy::IsAdminOrReadOnly => {
                "Administrator rights are required for this action."
            }
            Policy::IsSuperuser => "Superuser rights are required for this action.",
        }
    }

    /// Evaluates the predicate. `safe` marks a read-only HTTP method;
    /// `author_id` is the owning user of the target object, when one exists.
    pub fn allows(&self, user: Option<&User>, safe: bool, author_id: Option<i64>) -> bool {
        match self {
            Policy::IsAuthor => {
                matches!((user, author_id), (Some(u), Some(a)) if u.id == a)
            }
            Policy::IsModerator => user.is_some_and(User::is_moderator),
            Policy::IsAdmin => user.is_some_and(User::is_admin),
            Policy::IsAdminOrReadOnly => safe || user.is_some_and(User::is_admin),
            Policy::IsSuperuser => user.is_some_and(|u| u.is_superuser),
        }
    }
}

/// authorize
///
/// Short-circuiting OR over an ordered policy list. Evaluation order matches
/// the controllers' declared order (author first, then moderator, then
/// admin-or-read-only, then superuser). An anonymous caller attempting a
/// mutation is an identity failure (401), not an authorization failure.
pub fn authorize(
    policies: &[Policy],
    user: Option<&User>,
    safe: bool,
    author_id: Option<i64>,
) -> Result<(), ApiError> {
    if policies.iter().any(|p| p.allows(user, safe, author_id)) {
        return Ok(());
    }
    if user.is_none() && !safe {
        return Err(ApiError::Unauthorized(NOT_AUTHENTICATED.to_string()));
    }
    let detail = if policies.len() == 1 {
        policies[0].message()
    } else {
        DEFAULT_DETAIL
    };
    Err(ApiError::Forbidden(detail.to_string()))
}

// --- Per-controller gates ---

/// User administration: every method requires superuser or admin rights.
pub fn users_gate(user: &User) -> Result<(), ApiError> {
    authorize(
        &[Policy::IsSuperuser, Policy::IsAdmin],
        Some(user),
        false,
        None,
    )
}

/// Categories, genres, and titles: reads are open, mutations require admin
/// rights or superuser.
pub fn catalog_gate(user: Option<&User>, safe: bool) -> Result<(), ApiError> {
    authorize(
        &[Policy::IsAdminOrReadOnly, Policy::IsSuperuser],
        user,
        safe,
        None,
    )
}

/// Review/comment object operations: reads are open; mutations require the
/// author, a moderator, an admin, or a superuser, evaluated in that order.
/// Creation has no object yet, so it only requires authentication, which
/// the extractor enforces before any handler runs.
pub fn content_object_gate(
    user: Option<&User>,
    safe: bool,
    author_id: i64,
) -> Result<(), ApiError> {
    if safe {
        return Ok(());
    }
    if user.is_none() {
        return Err(ApiError::Unauthorized(NOT_AUTHENTICATED.to_string()));
    }
    authorize(
        &[
            Policy::IsAuthor,
            Policy::IsModerator,
            Policy::IsAdminOrReadOnly,
            Policy::IsSuperuser,
        ],
        user,
        safe,
        Some(author_id),
    )
}

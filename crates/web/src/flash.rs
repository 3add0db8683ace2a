//! One-shot notices carried across a redirect in a cookie.
//!
//! Only a short code is stored; the message text is looked up on read.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use lessons_core::access::DenialReason;

pub const FLASH_COOKIE: &str = "flash";

fn code(reason: DenialReason) -> &'static str {
    match reason {
        DenialReason::NoGrant => "no_grant",
        DenialReason::Revoked => "revoked",
        DenialReason::Expired => "expired",
    }
}

fn parse(code: &str) -> Option<DenialReason> {
    match code {
        "no_grant" => Some(DenialReason::NoGrant),
        "revoked" => Some(DenialReason::Revoked),
        "expired" => Some(DenialReason::Expired),
        _ => None,
    }
}

/// Queue a denial notice for the next page.
#[must_use]
pub fn push(jar: CookieJar, reason: DenialReason) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, code(reason)))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Read and clear the pending notice, if any.
#[must_use]
pub fn take(jar: CookieJar) -> (CookieJar, Option<&'static str>) {
    let Some(reason) = jar.get(FLASH_COOKIE).map(|c| parse(c.value())) else {
        return (jar, None);
    };
    let jar = jar.remove(Cookie::build(FLASH_COOKIE).path("/"));
    (jar, reason.map(DenialReason::message))
}

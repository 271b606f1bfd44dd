//! Store key layout. Every key is scoped under its job: `{job}/{id}` for
//! nodes and `{job}/{name}` for the well-known lists and counts.

pub const ROOT_URL_LIST: &str = "root-url-list";
pub const MALFORMED_URL_LIST: &str = "malformed-url-list";
pub const ROOT_DOMAIN_LIST: &str = "root-domain-list";
pub const URL_COUNT: &str = "url-count";
pub const DOMAIN_COUNT: &str = "domain-count";
pub const BUILD_COMPLETE: &str = "build-complete";

pub fn node_key(job: i64, id: i64) -> String {
    format!("{}/{}", job, id)
}

pub fn named_key(job: i64, name: &str) -> String {
    format!("{}/{}", job, name)
}

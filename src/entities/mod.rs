// Entity Models
// "Identity persists, values change"
//
// A member has:
// - Stable identity (UUID) that NEVER changes
// - Consolidated values merged from every source that mentioned them
// - Provenance: the set of sources that contributed

pub mod member;

pub use member::{Member, Gender, MemberStatus, Contact, NOT_AVAILABLE};

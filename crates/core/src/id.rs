//! Strongly-typed identifiers.
//!
//! Every entity id is a `domain-key` `Uuid<D>` wrapper with its own domain
//! marker, so an [`AccountId`] can never be passed where an [`AssetId`] is
//! expected. All ids are `Copy`, serialize as UUID strings and support
//! `v4()`, `nil()` and `parse(&str)`.

use domain_key::define_uuid;

pub use domain_key::UuidParseError;

define_uuid!(pub OrgIdDomain => OrgId);
define_uuid!(pub AutomationIdDomain => AutomationId);
define_uuid!(pub ExecutionIdDomain => ExecutionId);
define_uuid!(pub RecordIdDomain => RecordId);
define_uuid!(pub AccountIdDomain => AccountId);
define_uuid!(pub AssetIdDomain => AssetId);
define_uuid!(pub NodeIdDomain => NodeId);

//! # LDIF change records
//!
//! Reading and writing of LDIF change records (RFC 2849) for the ldapply
//! tool:
//!
//! - Change-record model (`add`, `delete`, `modify`, `modrdn`/`moddn`)
//! - A lazy, line-oriented reader with configurable trailing-space handling
//! - A writer used for reject files and verbose request echoing

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{Charset, LdifError, LdifReader, TrailingSpaceBehavior};
pub use record::{
    AddRecord, Attribute, ChangeRecord, DeleteRecord, Modification, ModifyDnRecord, ModifyRecord,
    ModType, RecordControl,
};
pub use writer::LdifWriter;

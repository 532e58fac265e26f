//! Composed directory requests.
//!
//! An `UpdateRequest` is the unit the request composer produces: the
//! operation payload plus its full control list in insertion order. The
//! pool dispatches them directly; the multi-update extended request encodes
//! them into its value.

use crate::controls::Control;

/// The directory operation kinds the tool issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    Add,
    Delete,
    Modify,
    ModifyDn,
    Search,
}

/// One attribute of an add request.
pub type AddAttribute = (String, Vec<Vec<u8>>);

/// A composed add request.
#[derive(Debug, Clone)]
pub struct AddUpdate {
    pub dn: String,
    pub attributes: Vec<AddAttribute>,
    pub controls: Vec<Control>,
}

/// A composed delete request.
#[derive(Debug, Clone)]
pub struct DeleteUpdate {
    pub dn: String,
    pub controls: Vec<Control>,
}

/// The modification kinds of a modify request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModOp {
    Add,
    Delete,
    Replace,
    Increment,
}

impl ModOp {
    /// The RFC 4511 / RFC 4525 wire value.
    #[must_use]
    pub fn wire_value(self) -> i64 {
        match self {
            ModOp::Add => 0,
            ModOp::Delete => 1,
            ModOp::Replace => 2,
            ModOp::Increment => 3,
        }
    }
}

/// One change of a modify request.
#[derive(Debug, Clone)]
pub struct ModChange {
    pub op: ModOp,
    pub attribute: String,
    pub values: Vec<Vec<u8>>,
}

/// A composed modify request.
#[derive(Debug, Clone)]
pub struct ModifyUpdate {
    pub dn: String,
    pub changes: Vec<ModChange>,
    pub controls: Vec<Control>,
}

/// A composed modify DN request.
#[derive(Debug, Clone)]
pub struct ModifyDnUpdate {
    pub dn: String,
    pub new_rdn: String,
    pub delete_old_rdn: bool,
    pub new_superior: Option<String>,
    pub controls: Vec<Control>,
}

/// A composed request ready for dispatch or buffering.
#[derive(Debug, Clone)]
pub enum UpdateRequest {
    Add(AddUpdate),
    Delete(DeleteUpdate),
    Modify(ModifyUpdate),
    ModifyDn(ModifyDnUpdate),
}

impl UpdateRequest {
    /// The target DN.
    #[must_use]
    pub fn dn(&self) -> &str {
        match self {
            UpdateRequest::Add(r) => &r.dn,
            UpdateRequest::Delete(r) => &r.dn,
            UpdateRequest::Modify(r) => &r.dn,
            UpdateRequest::ModifyDn(r) => &r.dn,
        }
    }

    /// The operation type.
    #[must_use]
    pub fn operation_type(&self) -> OperationType {
        match self {
            UpdateRequest::Add(_) => OperationType::Add,
            UpdateRequest::Delete(_) => OperationType::Delete,
            UpdateRequest::Modify(_) => OperationType::Modify,
            UpdateRequest::ModifyDn(_) => OperationType::ModifyDn,
        }
    }

    /// The attached controls in insertion order.
    #[must_use]
    pub fn controls(&self) -> &[Control] {
        match self {
            UpdateRequest::Add(r) => &r.controls,
            UpdateRequest::Delete(r) => &r.controls,
            UpdateRequest::Modify(r) => &r.controls,
            UpdateRequest::ModifyDn(r) => &r.controls,
        }
    }

    /// Appends a control to this request.
    pub fn push_control(&mut self, control: Control) {
        let controls = match self {
            UpdateRequest::Add(r) => &mut r.controls,
            UpdateRequest::Delete(r) => &mut r.controls,
            UpdateRequest::Modify(r) => &mut r.controls,
            UpdateRequest::ModifyDn(r) => &mut r.controls,
        };
        controls.push(control);
    }
}

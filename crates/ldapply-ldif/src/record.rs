//! Change-record model.
//!
//! A `ChangeRecord` is one parsed LDIF change record. Attribute values are
//! kept as raw bytes because base64-encoded values may be binary.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// A single attribute with one or more values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute description, possibly with options (e.g. `userCertificate;binary`).
    pub name: String,
    /// Raw attribute values.
    pub values: Vec<Vec<u8>>,
}

impl Attribute {
    /// The attribute name without any `;option` suffixes, lowercased.
    #[must_use]
    pub fn base_name(&self) -> String {
        self.name
            .split(';')
            .next()
            .unwrap_or(&self.name)
            .to_ascii_lowercase()
    }
}

/// The modification type of one `modify` component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModType {
    /// Add the listed values.
    Add,
    /// Delete the listed values, or the whole attribute if none listed.
    Delete,
    /// Replace all values with the listed ones.
    Replace,
    /// Increment the attribute by the single listed value (RFC 4525).
    Increment,
}

impl ModType {
    /// The LDIF keyword for this modification type.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            ModType::Add => "add",
            ModType::Delete => "delete",
            ModType::Replace => "replace",
            ModType::Increment => "increment",
        }
    }
}

/// One component of a `modify` change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modification {
    /// What to do with the attribute.
    pub op: ModType,
    /// The attribute description.
    pub attribute: String,
    /// The values for the operation (may be empty, e.g. delete-all).
    pub values: Vec<Vec<u8>>,
}

impl Modification {
    /// The attribute name without options, lowercased.
    #[must_use]
    pub fn base_attribute(&self) -> String {
        self.attribute
            .split(';')
            .next()
            .unwrap_or(&self.attribute)
            .to_ascii_lowercase()
    }
}

/// A request control attached to a single change record via a `control:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordControl {
    /// The control OID.
    pub oid: String,
    /// Criticality flag.
    pub critical: bool,
    /// Raw control value, if any.
    pub value: Option<Vec<u8>>,
}

/// An `add` change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddRecord {
    /// Target entry DN.
    pub dn: String,
    /// Attributes of the entry to create.
    pub attributes: Vec<Attribute>,
    /// Per-record request controls.
    pub controls: Vec<RecordControl>,
}

impl AddRecord {
    /// Looks up an attribute by base name (case-insensitive, options ignored).
    #[must_use]
    pub fn get_attribute(&self, base_name: &str) -> Option<&Attribute> {
        let wanted = base_name.to_ascii_lowercase();
        self.attributes.iter().find(|a| a.base_name() == wanted)
    }
}

/// A `delete` change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRecord {
    /// Target entry DN.
    pub dn: String,
    /// Per-record request controls.
    pub controls: Vec<RecordControl>,
}

/// A `modify` change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyRecord {
    /// Target entry DN.
    pub dn: String,
    /// The ordered modifications to apply.
    pub modifications: Vec<Modification>,
    /// Per-record request controls.
    pub controls: Vec<RecordControl>,
}

impl ModifyRecord {
    /// Returns a copy of this record that targets `dn` instead of the
    /// original DN, preserving modifications and record controls.
    #[must_use]
    pub fn with_target_dn(&self, dn: &str) -> ModifyRecord {
        ModifyRecord {
            dn: dn.to_string(),
            modifications: self.modifications.clone(),
            controls: self.controls.clone(),
        }
    }
}

/// A `modrdn`/`moddn` change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifyDnRecord {
    /// Target entry DN.
    pub dn: String,
    /// The new RDN.
    pub new_rdn: String,
    /// Whether the old RDN attribute values are removed.
    pub delete_old_rdn: bool,
    /// Optional new superior DN the entry moves under.
    pub new_superior: Option<String>,
    /// Per-record request controls.
    pub controls: Vec<RecordControl>,
}

impl ModifyDnRecord {
    /// The DN the entry will have after the operation, if it can be derived
    /// locally. A malformed DN yields `None`; the request is still sent so
    /// the server can apply its own handling.
    #[must_use]
    pub fn new_dn(&self) -> Option<String> {
        if self.new_rdn.is_empty() || !self.new_rdn.contains('=') {
            return None;
        }
        match &self.new_superior {
            Some(sup) => Some(format!("{},{}", self.new_rdn, sup)),
            None => {
                let parent = split_parent(&self.dn)?;
                if parent.is_empty() {
                    Some(self.new_rdn.clone())
                } else {
                    Some(format!("{},{}", self.new_rdn, parent))
                }
            }
        }
    }
}

/// Splits off the parent portion of a DN, honoring `\,` escapes.
fn split_parent(dn: &str) -> Option<String> {
    let bytes = dn.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b',' => return Some(dn[i + 1..].trim_start().to_string()),
            _ => i += 1,
        }
    }
    if dn.contains('=') {
        Some(String::new())
    } else {
        None
    }
}

/// One parsed LDIF change record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeRecord {
    /// An `add` record.
    Add(AddRecord),
    /// A `delete` record.
    Delete(DeleteRecord),
    /// A `modify` record.
    Modify(ModifyRecord),
    /// A `modrdn`/`moddn` record.
    ModifyDn(ModifyDnRecord),
}

impl ChangeRecord {
    /// The target DN of this record.
    #[must_use]
    pub fn dn(&self) -> &str {
        match self {
            ChangeRecord::Add(r) => &r.dn,
            ChangeRecord::Delete(r) => &r.dn,
            ChangeRecord::Modify(r) => &r.dn,
            ChangeRecord::ModifyDn(r) => &r.dn,
        }
    }

    /// The per-record controls of this record.
    #[must_use]
    pub fn controls(&self) -> &[RecordControl] {
        match self {
            ChangeRecord::Add(r) => &r.controls,
            ChangeRecord::Delete(r) => &r.controls,
            ChangeRecord::Modify(r) => &r.controls,
            ChangeRecord::ModifyDn(r) => &r.controls,
        }
    }

    /// Renders this record as LDIF lines, without trailing blank line.
    #[must_use]
    pub fn to_ldif_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(value_line("dn", self.dn().as_bytes()));
        match self {
            ChangeRecord::Add(r) => {
                lines.push("changetype: add".to_string());
                for attr in &r.attributes {
                    for value in &attr.values {
                        lines.push(value_line(&attr.name, value));
                    }
                }
            }
            ChangeRecord::Delete(_) => {
                lines.push("changetype: delete".to_string());
            }
            ChangeRecord::Modify(r) => {
                lines.push("changetype: modify".to_string());
                for (i, m) in r.modifications.iter().enumerate() {
                    lines.push(format!("{}: {}", m.op.keyword(), m.attribute));
                    for value in &m.values {
                        lines.push(value_line(&m.attribute, value));
                    }
                    if i + 1 < r.modifications.len() {
                        lines.push("-".to_string());
                    }
                }
            }
            ChangeRecord::ModifyDn(r) => {
                lines.push("changetype: moddn".to_string());
                lines.push(value_line("newrdn", r.new_rdn.as_bytes()));
                lines.push(format!(
                    "deleteoldrdn: {}",
                    if r.delete_old_rdn { "1" } else { "0" }
                ));
                if let Some(sup) = &r.new_superior {
                    lines.push(value_line("newsuperior", sup.as_bytes()));
                }
            }
        }
        lines
    }
}

/// Whether a value can be written as an LDIF safe-string (RFC 2849).
#[must_use]
pub fn is_safe_string(value: &[u8]) -> bool {
    if value.is_empty() {
        return true;
    }
    let first = value[0];
    if first == b' ' || first == b':' || first == b'<' {
        return false;
    }
    if value[value.len() - 1] == b' ' {
        return false;
    }
    value.iter().all(|&b| b > 31 && b < 127)
}

/// Renders `name: value`, base64-encoding unsafe values as `name:: b64`.
#[must_use]
pub fn value_line(name: &str, value: &[u8]) -> String {
    if is_safe_string(value) {
        // Safe strings are ASCII by construction.
        format!("{}: {}", name, String::from_utf8_lossy(value))
    } else {
        format!("{}:: {}", name, BASE64.encode(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name_strips_options() {
        let attr = Attribute {
            name: "userCertificate;binary".to_string(),
            values: vec![],
        };
        assert_eq!(attr.base_name(), "usercertificate");
    }

    #[test]
    fn test_new_dn_same_parent() {
        let rec = ModifyDnRecord {
            dn: "uid=a,ou=people,dc=example,dc=com".to_string(),
            new_rdn: "uid=b".to_string(),
            delete_old_rdn: true,
            new_superior: None,
            controls: vec![],
        };
        assert_eq!(
            rec.new_dn().as_deref(),
            Some("uid=b,ou=people,dc=example,dc=com")
        );
    }

    #[test]
    fn test_new_dn_with_new_superior() {
        let rec = ModifyDnRecord {
            dn: "uid=a,ou=people,dc=example,dc=com".to_string(),
            new_rdn: "uid=a".to_string(),
            delete_old_rdn: false,
            new_superior: Some("ou=staff,dc=example,dc=com".to_string()),
            controls: vec![],
        };
        assert_eq!(
            rec.new_dn().as_deref(),
            Some("uid=a,ou=staff,dc=example,dc=com")
        );
    }

    #[test]
    fn test_new_dn_malformed_rdn() {
        let rec = ModifyDnRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            new_rdn: "not-an-rdn".to_string(),
            delete_old_rdn: false,
            new_superior: None,
            controls: vec![],
        };
        assert_eq!(rec.new_dn(), None);
    }

    #[test]
    fn test_split_parent_honors_escapes() {
        assert_eq!(
            split_parent("cn=a\\,b,dc=example,dc=com").as_deref(),
            Some("dc=example,dc=com")
        );
    }

    #[test]
    fn test_safe_string_rules() {
        assert!(is_safe_string(b"plain value"));
        assert!(!is_safe_string(b" leading space"));
        assert!(!is_safe_string(b"trailing space "));
        assert!(!is_safe_string(b":colon"));
        assert!(!is_safe_string(b"<url"));
        assert!(!is_safe_string("süß".as_bytes()));
    }

    #[test]
    fn test_value_line_encodes_unsafe() {
        assert_eq!(value_line("cn", b"plain"), "cn: plain");
        assert_eq!(value_line("cn", b" x"), format!("cn:: {}", "IHg="));
    }

    #[test]
    fn test_modify_to_ldif_lines() {
        let rec = ChangeRecord::Modify(ModifyRecord {
            dn: "uid=a,dc=example,dc=com".to_string(),
            modifications: vec![
                Modification {
                    op: ModType::Replace,
                    attribute: "mail".to_string(),
                    values: vec![b"a@example.com".to_vec()],
                },
                Modification {
                    op: ModType::Delete,
                    attribute: "description".to_string(),
                    values: vec![],
                },
            ],
            controls: vec![],
        });
        assert_eq!(
            rec.to_ldif_lines(),
            vec![
                "dn: uid=a,dc=example,dc=com",
                "changetype: modify",
                "replace: mail",
                "mail: a@example.com",
                "-",
                "delete: description",
            ]
        );
    }

    #[test]
    fn test_with_target_dn_preserves_mods_and_controls() {
        let rec = ModifyRecord {
            dn: "uid=orig,dc=example,dc=com".to_string(),
            modifications: vec![Modification {
                op: ModType::Add,
                attribute: "description".to_string(),
                values: vec![b"x".to_vec()],
            }],
            controls: vec![RecordControl {
                oid: "1.2.3.4".to_string(),
                critical: true,
                value: None,
            }],
        };
        let swapped = rec.with_target_dn("uid=other,dc=example,dc=com");
        assert_eq!(swapped.dn, "uid=other,dc=example,dc=com");
        assert_eq!(swapped.modifications, rec.modifications);
        assert_eq!(swapped.controls, rec.controls);
    }
}

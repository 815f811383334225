use serde_json::{Map, Value};

/// The lead-capture tables that accept public submissions. Each carries an
/// explicit field contract so translation and allow-listing stay exhaustive
/// instead of flowing through an open-ended mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTable {
    Quotes,
    Contacts,
    Applications,
}

/// Tables the admin surface may proxy. Anything else is rejected before a
/// remote call is built.
pub const ADMIN_TABLES: &[&str] = &["quotes", "contacts", "applications", "jobs", "resources"];

/// Fields that exist only for client-side UX and are never persisted.
const UI_ONLY_FIELDS: &[&str] = &["agree"];

impl FormTable {
    pub fn name(&self) -> &'static str {
        match self {
            FormTable::Quotes => "quotes",
            FormTable::Contacts => "contacts",
            FormTable::Applications => "applications",
        }
    }

    /// Remote columns this table accepts. Unknown fields are silently
    /// dropped, never stored.
    pub fn allowed_columns(&self) -> &'static [&'static str] {
        match self {
            FormTable::Quotes => &["category", "name", "whatsapp", "pincode"],
            FormTable::Contacts => &["name", "email", "phone", "message"],
            FormTable::Applications => &[
                "job_id",
                "position",
                "full_name",
                "email",
                "phone",
                "location",
                "experience_years",
                "linkedin",
                "portfolio",
                "resume_url",
                "resume_filename",
                "resume_content_type",
                "cover_letter",
                "expected_salary",
                "notice_period",
            ],
        }
    }

    fn rules(&self) -> &'static [FieldRule] {
        const QUOTES: &[FieldRule] = &[
            FieldRule::required("name", 2),
            FieldRule::required("whatsapp", 7),
            FieldRule::required("pincode", 1),
        ];
        const CONTACTS: &[FieldRule] = &[
            FieldRule::required("name", 1),
            FieldRule {
                name: "email",
                required: true,
                min_len: 3,
                kind: FieldKind::Email,
            },
        ];
        const APPLICATIONS: &[FieldRule] = &[
            FieldRule::required("position", 1),
            FieldRule::required("fullName", 2),
            FieldRule {
                name: "email",
                required: true,
                min_len: 3,
                kind: FieldKind::Email,
            },
            FieldRule::required("phone", 7),
            FieldRule::required("location", 2),
            FieldRule::required("coverLetter", 20),
            FieldRule {
                name: "linkedin",
                required: false,
                min_len: 0,
                kind: FieldKind::Url,
            },
            FieldRule {
                name: "portfolio",
                required: false,
                min_len: 0,
                kind: FieldKind::Url,
            },
        ];
        match self {
            FormTable::Quotes => QUOTES,
            FormTable::Contacts => CONTACTS,
            FormTable::Applications => APPLICATIONS,
        }
    }

    /// Check the incoming payload against the table's required-field
    /// contract. Returns a field -> message report on failure.
    pub fn validate(&self, payload: &Value) -> Result<(), Value> {
        let mut report = Map::new();

        for rule in self.rules() {
            let value = payload.get(rule.name).and_then(field_text);
            match value {
                None => {
                    if rule.required {
                        report.insert(rule.name.to_string(), Value::String("Required".to_string()));
                    }
                }
                Some(s) => {
                    if rule.required && s.chars().count() < rule.min_len {
                        report.insert(
                            rule.name.to_string(),
                            Value::String(format!("Must be at least {} characters", rule.min_len)),
                        );
                        continue;
                    }
                    match rule.kind {
                        FieldKind::Email if !s.contains('@') => {
                            report.insert(
                                rule.name.to_string(),
                                Value::String("Invalid email".to_string()),
                            );
                        }
                        FieldKind::Url if !s.is_empty() && !s.starts_with("http") => {
                            report.insert(
                                rule.name.to_string(),
                                Value::String("Invalid URL".to_string()),
                            );
                        }
                        _ => {}
                    }
                }
            }
        }

        if report.is_empty() {
            Ok(())
        } else {
            Err(Value::Object(report))
        }
    }

    /// Translate an incoming payload into the record forwarded to the remote
    /// store: UI-only fields stripped, keys converted to snake_case, and only
    /// allow-listed columns kept.
    pub fn normalize(&self, payload: &Value) -> Value {
        let mut record = Map::new();
        let Some(obj) = payload.as_object() else {
            return Value::Object(record);
        };

        for (key, value) in obj {
            if UI_ONLY_FIELDS.contains(&key.as_str()) {
                continue;
            }
            let column = to_snake_case(key);
            if self.allowed_columns().contains(&column.as_str()) {
                record.insert(column, value.clone());
            }
        }

        Value::Object(record)
    }
}

#[derive(Debug)]
enum FieldKind {
    Text,
    Email,
    Url,
}

#[derive(Debug)]
struct FieldRule {
    name: &'static str,
    required: bool,
    min_len: usize,
    kind: FieldKind,
}

impl FieldRule {
    const fn required(name: &'static str, min_len: usize) -> Self {
        Self {
            name,
            required: true,
            min_len,
            kind: FieldKind::Text,
        }
    }
}

fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// camelCase -> snake_case, matching the remote store's column convention.
pub fn to_snake_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

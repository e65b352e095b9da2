use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Key of the one field that collects several values (visit hours).
pub const HOURS_FIELD: &str = "hora";

// ===================================================================
// Default-value suppliers
// ===================================================================

/// Value offered by the "use default" button. Clock-based defaults are
/// resolved against the instant the button is rendered or pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    /// Current date as `DD/MM/YYYY`.
    Today,
    /// Current time as `HH:MM`.
    Now,
    Literal(String),
}

impl DefaultValue {
    pub fn resolve(&self, now: NaiveDateTime) -> String {
        match self {
            DefaultValue::Today => now.format("%d/%m/%Y").to_string(),
            DefaultValue::Now => now.format("%H:%M").to_string(),
            DefaultValue::Literal(s) => s.clone(),
        }
    }
}

// ===================================================================
// Validators
// ===================================================================

/// Shape a field's value is expected to have once normalized.
///
/// Validators are advisory: a value that does not match is still accepted,
/// the mismatch is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Date,
    Time,
    Number,
    YesNo,
    Level,
}

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").unwrap());
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{1,2}:\d{2}$").unwrap());
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d*\.?\d+$").unwrap());
static YES_NO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^(SI|NO)$").unwrap());
static LEVEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(Alto|Medio|Bajo)$").unwrap());

impl Validator {
    pub fn accepts(self, value: &str) -> bool {
        let re = match self {
            Validator::Date => &DATE_RE,
            Validator::Time => &TIME_RE,
            Validator::Number => &NUMBER_RE,
            Validator::YesNo => &YES_NO_RE,
            Validator::Level => &LEVEL_RE,
        };
        re.is_match(value)
    }
}

// ===================================================================
// Field definitions
// ===================================================================

#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub key: String,
    pub prompt: String,
    pub default: Option<DefaultValue>,
    pub quick_options: Vec<String>,
    pub validator: Option<Validator>,
    /// Collects several values through the add/custom/finish sub-flow.
    pub multiple: bool,
}

impl FieldSpec {
    pub fn new(key: &str, prompt: &str) -> Self {
        Self {
            key: key.to_string(),
            prompt: prompt.to_string(),
            default: None,
            quick_options: Vec::new(),
            validator: None,
            multiple: false,
        }
    }

    pub fn default_value(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn literal_default(self, value: &str) -> Self {
        self.default_value(DefaultValue::Literal(value.to_string()))
    }

    pub fn options(mut self, options: &[&str]) -> Self {
        self.quick_options = options.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn multiple(mut self) -> Self {
        self.multiple = true;
        self
    }

    /// Human-readable label derived from the key: `nivel_pozo` -> `Nivel Pozo`.
    pub fn title(&self) -> String {
        title_case(&self.key)
    }
}

pub fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ===================================================================
// Registry
// ===================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("duplicate field key `{0}`")]
    DuplicateKey(String),
}

/// Ordered, immutable list of fields. The order is the traversal order of
/// the wizard; sessions refer to fields by index, so it must not change
/// while sessions are in flight.
#[derive(Debug, Clone)]
pub struct Registry {
    fields: Vec<FieldSpec>,
}

impl Registry {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for f in &fields {
            if !seen.insert(f.key.as_str()) {
                return Err(RegistryError::DuplicateKey(f.key.clone()));
            }
        }
        Ok(Self { fields })
    }

    /// The plant inspection sheet, checked.
    #[cfg(test)]
    pub fn planilla() -> Self {
        Self::new(planilla_fields()).unwrap()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&FieldSpec> {
        self.fields.get(index)
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    #[cfg(test)]
    pub fn position(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.key.as_str())
    }
}

/// Fields of the plant inspection sheet, in the order they are asked.
pub fn planilla_fields() -> Vec<FieldSpec> {
    const YES_NO: &[&str] = &["SI", "NO"];
    const PUMP: &[&str] = &["Funcionando", "Parada", "Mantenimiento"];
    vec![
        FieldSpec::new("fecha", "📅 **Fecha** (DD/MM/YYYY o \"hoy\"):")
            .default_value(DefaultValue::Today)
            .options(&["hoy"])
            .validator(Validator::Date),
        FieldSpec::new(HOURS_FIELD, "⏰ **Hora(s) de visita** - Puedes seleccionar varias:")
            .default_value(DefaultValue::Now)
            .options(&["8:00", "10:00", "12:00", "14:00", "16:00", "18:00"])
            .validator(Validator::Time)
            .multiple(),
        FieldSpec::new("visita", "👀 **Observaciones de visita**:")
            .literal_default("Normal")
            .options(&["Normal", "Sin novedad"]),
        FieldSpec::new("bomba1", "🔧 **Bomba 1**:")
            .literal_default("Funcionando")
            .options(PUMP),
        FieldSpec::new("bomba2", "🔧 **Bomba 2**:")
            .literal_default("Funcionando")
            .options(PUMP),
        FieldSpec::new("caudal", "💧 **Caudal**:")
            .literal_default("Normal")
            .options(&["Normal"]),
        FieldSpec::new("nivel_pozo", "📊 **Nivel del Pozo**:")
            .literal_default("Medio")
            .options(&["Alto", "Medio", "Bajo"])
            .validator(Validator::Level),
        FieldSpec::new("solidos", "🧪 **Sólidos (CC)**:")
            .literal_default("0")
            .validator(Validator::Number),
        FieldSpec::new("oxigeno_disuelto", "🫧 **Oxígeno Disuelto (mg/l)**:")
            .literal_default("0")
            .validator(Validator::Number),
        FieldSpec::new("cloro", "🟢 **Cloro (mg/l)**:")
            .literal_default("0")
            .validator(Validator::Number),
        FieldSpec::new("ph", "⚖️ **pH**:")
            .literal_default("7.0")
            .validator(Validator::Number),
        FieldSpec::new("medidor_salida", "📏 **Medidor de salida**:")
            .literal_default("0")
            .validator(Validator::Number),
        FieldSpec::new("aseo_alrededores", "🧹 **¿Aseo alrededores?**")
            .literal_default("NO")
            .options(YES_NO)
            .validator(Validator::YesNo),
        FieldSpec::new("lavado_canastilla", "🧺 **¿Lavado canastilla?**")
            .literal_default("NO")
            .options(YES_NO)
            .validator(Validator::YesNo),
        FieldSpec::new("desalojo_lodos", "🚛 **¿Desalojo de lodos?**")
            .literal_default("NO")
            .options(YES_NO)
            .validator(Validator::YesNo),
        FieldSpec::new("limpieza_sedimentador", "🧽 **¿Limpieza sedimentador?**")
            .literal_default("NO")
            .options(YES_NO)
            .validator(Validator::YesNo),
    ]
}

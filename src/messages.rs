//! Operator-facing texts. Multi-line replies are minijinja templates so the
//! wording lives in one place, apart from the state machine.

use minijinja::Environment;
use serde::Serialize;

pub const WELCOME: &str = "welcome";
pub const SAVING: &str = "saving";
pub const SAVED: &str = "saved";
pub const SAVE_FAILED: &str = "save_failed";
pub const STATUS_ACTIVE: &str = "status_active";
pub const STATUS_IDLE: &str = "status_idle";
pub const STATUS_PENDING: &str = "status_pending";
pub const STATS: &str = "stats";
pub const CLEAR_PROMPT: &str = "clear_prompt";
pub const CLEARED: &str = "cleared";
pub const HOURS_SELECTED: &str = "hours_selected";
pub const HOURS_CUSTOM: &str = "hours_custom";
pub const HOUR_ADDED: &str = "hour_added";
pub const DOWNLOAD_CAPTION: &str = "download_caption";

const TEMPLATES: &[(&str, &str)] = &[
    (
        WELCOME,
        "🌱 **Bot de Planilla Cloud**

📊 Registros totales: {{ total_records }}
💾 Tamaño datos: {{ file_size_kb }} KB

📋 {{ field_count }} campos básicos a completar
⚡ Usa botones para rapidez
🕐 Múltiples horarios de visita

Empezamos:",
    ),
    (SAVING, "☁️ Guardando en la nube en {{ elapsed }}s..."),
    (
        SAVED,
        "✅ **¡Registro guardado en la nube!**

⏱️ Completado en {{ elapsed }}s
📊 Total registros: {{ total_records }}
💾 Datos: {{ file_size_kb }} KB

🔄 /start - Nuevo registro
📊 /stats - Ver estadísticas
⬇️ /descargar - Obtener JSON",
    ),
    (
        SAVE_FAILED,
        "⚠️ **Error guardando en cloud**

📋 Datos conservados
🔄 /guardar para reintentar",
    ),
    (
        STATUS_ACTIVE,
        "📊 **Estado del Registro Activo**

Progreso: {{ bar }} {{ completed }}/{{ total }}
Siguiente campo: **{{ next_field }}**

❌ Usa /cancel para cancelar registro",
    ),
    (
        STATUS_IDLE,
        "📭 **No hay registro activo**

🔄 Usa /start para comenzar nuevo registro",
    ),
    (
        STATUS_PENDING,
        "⚠️ **Registro con error de guardado**

💾 Usa /guardar para reintentar",
    ),
    (
        STATS,
        "📊 **Estadísticas Cloud**

🗂️ Total registros: {{ total_records }}
💾 Tamaño archivo: {{ file_size_kb }} KB
⏰ Última actualización: {{ last_updated }}

⬇️ /descargar - Obtener datos JSON
🧹 /limpiar_cloud - Limpiar registros",
    ),
    (
        CLEAR_PROMPT,
        "⚠️ **¿Limpiar {{ total_records }} registros?**

Esta acción eliminará todos los datos de la nube.
Úsala solo después de sincronizar con Excel.

Responde 'LIMPIAR CLOUD' para confirmar.",
    ),
    (
        CLEARED,
        "✅ **Registros cloud eliminados**

☁️ Nube lista para nuevos datos
🔄 /start para nuevo registro",
    ),
    (
        HOURS_SELECTED,
        "⏰ **Horas seleccionadas**: {{ hours }}

Selecciona más horas o finaliza:",
    ),
    (
        HOURS_CUSTOM,
        "⏰ **Horas actuales**: {{ hours }}

✍️ **Escribe la hora personalizada** (ej: 7:30, 15:45):",
    ),
    (
        HOUR_ADDED,
        "✅ **Hora añadida**: {{ hour }}
⏰ **Horas totales**: {{ hours }}

Selecciona más horas o finaliza:",
    ),
    (
        DOWNLOAD_CAPTION,
        "☁️ **Datos de la nube**

Archivo JSON con todos los registros",
    ),
];

// Single-line replies.
pub const START_FIRST: &str = "Usa /start para comenzar";
pub const SESSION_EXPIRED: &str = "❌ Sesión expirada. Usa /start";
pub const BAD_PAYLOAD: &str = "❌ Error procesando respuesta. Usa /start";
pub const CANCELLED: &str = "❌ Registro cancelado. Usa /start para comenzar nuevo registro";
pub const CLEAR_ABORTED: &str = "❌ Limpieza cancelada";
pub const CLEAR_FAILED: &str = "❌ Error limpiando registros cloud";
pub const NO_DATA: &str = "📭 No hay datos para descargar";
pub const NOTHING_TO_SAVE: &str = "📭 No hay registro pendiente de guardar";
pub const STORE_UNAVAILABLE: &str = "❌ No se pudieron leer las estadísticas";
pub const EVENT_FAILED: &str = "❌ Error procesando el mensaje. Intenta de nuevo o usa /start";

pub fn wrong_field(expected: &str) -> String {
    format!("❌ Campo incorrecto. Se esperaba: {expected}")
}

pub fn confirmation(title: &str, value: &str) -> String {
    format!("✅ **{title}**: {value}")
}

/// Ten-cell progress bar for `done` out of `total`.
pub fn progress_bar(done: usize, total: usize) -> String {
    let filled = if total == 0 { 10 } else { (done * 10 / total).min(10) };
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Size as printed to the operator: `0`, `1.5`, `12.34`.
pub fn kb(size: f64) -> String {
    format!("{size}")
}

pub struct Messages {
    env: Environment<'static>,
}

impl Messages {
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)?;
        }
        Ok(Self { env })
    }

    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(ctx)
    }
}

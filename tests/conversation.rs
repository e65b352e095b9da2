mod common;

use common::{
    button, command, conversation_id, payloads, read_log, run_events, text, texts,
};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Every event of one complete form, starting with `/start`.
fn full_form(id: &str) -> Vec<Value> {
    vec![
        command(id, "start"),
        text(id, "15/3/24"),
        button(id, "hora:add:8:00"),
        button(id, "hora:add:14:00"),
        button(id, "hora:custom"),
        text(id, "7:30"),
        button(id, "hora:finish"),
        button(id, "visita:DEFAULT"),
        button(id, "bomba1:Parada"),
        text(id, "funcionando"),
        button(id, "caudal:DEFAULT"),
        text(id, "alto"),
        text(id, "5"),
        text(id, "6.5"),
        text(id, "1.2"),
        text(id, "7"),
        text(id, "123"),
        text(id, "si"),
        text(id, "no"),
        button(id, "desalojo_lodos:SI"),
        button(id, "limpieza_sedimentador:DEFAULT"),
    ]
}

fn conversation_file(dir: &Path, id: &str) -> std::path::PathBuf {
    dir.join("sessions").join(format!("conversation-{id}.json"))
}

#[test]
fn complete_form_is_saved_to_log_and_backup() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(dir.path(), &full_form(&id));

    let welcome = texts(&outputs[0]);
    assert!(welcome.contains("Bot de Planilla Cloud"));
    assert!(welcome.contains("16 campos"));
    assert!(welcome.contains("(1/16)"));
    assert_eq!(outputs[0]["conversation_id"], id.as_str());

    let last = texts(outputs.last().unwrap());
    assert!(last.contains("¡Registro guardado en la nube!"), "{last}");
    assert!(last.contains("Total registros: 1"));

    let log = read_log(dir.path(), "registros_planilla.json");
    assert_eq!(log["metadata"]["total_records"], 1);
    let data = &log["records"][0]["data"];
    assert_eq!(data["fecha"], "15/03/2024");
    assert_eq!(data["hora"], "8:00, 14:00, 07:30");
    assert_eq!(data["visita"], "Normal");
    assert_eq!(data["bomba1"], "Parada");
    assert_eq!(data["bomba2"], "funcionando");
    assert_eq!(data["caudal"], "Normal");
    assert_eq!(data["nivel_pozo"], "Alto");
    assert_eq!(data["ph"], "7");
    assert_eq!(data["aseo_alrededores"], "SI");
    assert_eq!(data["lavado_canastilla"], "NO");
    assert_eq!(data["desalojo_lodos"], "SI");
    assert_eq!(data["limpieza_sedimentador"], "NO");

    let keys: Vec<&String> = data.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 16);

    let backup = read_log(dir.path(), "registros_backup.json");
    assert_eq!(backup["records"], log["records"]);

    // Nothing left to remember once the record is saved.
    assert!(!conversation_file(dir.path(), &id).exists());
}

#[test]
fn field_keys_are_stored_in_form_order() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    run_events(dir.path(), &full_form(&id));

    let raw = fs::read_to_string(dir.path().join("registros_planilla.json")).unwrap();
    let fecha = raw.find("\"fecha\"").unwrap();
    let hora = raw.find("\"hora\"").unwrap();
    let limpieza = raw.find("\"limpieza_sedimentador\"").unwrap();
    assert!(fecha < hora && hora < limpieza);
}

#[test]
fn hour_keyboard_offers_custom_and_finish() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(
        dir.path(),
        &[command(&id, "start"), text(&id, "hoy"), button(&id, "hora:add:8:00")],
    );

    let hour_buttons = payloads(&outputs[1]);
    assert!(hour_buttons.contains(&"hora:add:8:00".to_string()));
    assert!(hour_buttons.contains(&"hora:custom".to_string()));
    assert!(hour_buttons.contains(&"hora:finish".to_string()));
    assert!(!hour_buttons.iter().any(|p| p.ends_with(":DEFAULT")));

    assert!(texts(&outputs[2]).contains("Horas seleccionadas**: 8:00"));
}

#[test]
fn single_value_keyboard_offers_default() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(dir.path(), &[command(&id, "start")]);
    let buttons = payloads(&outputs[0]);
    assert_eq!(buttons, vec!["fecha:hoy".to_string(), "fecha:DEFAULT".to_string()]);
}

#[test]
fn button_for_another_field_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(
        dir.path(),
        &[
            command(&id, "start"),
            button(&id, "hora:add:8:00"),
            command(&id, "status"),
        ],
    );
    assert!(texts(&outputs[1]).contains("Se esperaba: fecha"));
    assert!(texts(&outputs[2]).contains("Siguiente campo: **Fecha**"));
}

#[test]
fn text_without_session_asks_for_start() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(dir.path(), &[text(&id, "hola"), button(&id, "fecha:hoy")]);
    assert_eq!(texts(&outputs[0]), "Usa /start para comenzar");
    assert!(texts(&outputs[1]).contains("Sesión expirada"));
}

#[test]
fn status_tracks_progress_and_cancel_resets() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let outputs = run_events(
        dir.path(),
        &[
            command(&id, "status"),
            command(&id, "start"),
            text(&id, "hoy"),
            command(&id, "status"),
            command(&id, "cancel"),
            command(&id, "status"),
        ],
    );
    assert!(texts(&outputs[0]).contains("No hay registro activo"));
    let status = texts(&outputs[3]);
    assert!(status.contains("1/16"));
    assert!(status.contains("Siguiente campo: **Hora**"));
    assert!(texts(&outputs[4]).contains("Registro cancelado"));
    assert!(texts(&outputs[5]).contains("No hay registro activo"));
    assert!(!conversation_file(dir.path(), &id).exists());
}

#[test]
fn conversations_do_not_share_forms() {
    let dir = tempfile::tempdir().unwrap();
    let a = conversation_id();
    let b = conversation_id();
    let outputs = run_events(
        dir.path(),
        &[
            command(&a, "start"),
            text(&a, "hoy"),
            command(&b, "start"),
            command(&a, "status"),
            command(&b, "status"),
        ],
    );
    assert!(texts(&outputs[3]).contains("Siguiente campo: **Hora**"));
    assert!(texts(&outputs[4]).contains("Siguiente campo: **Fecha**"));
}

#[test]
fn stats_and_download_reflect_saved_records() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let mut events = full_form(&id);
    events.push(command(&id, "stats"));
    events.push(command(&id, "descargar"));
    let outputs = run_events(dir.path(), &events);

    let stats = texts(&outputs[events.len() - 2]);
    assert!(stats.contains("Total registros: 1"));
    assert!(!stats.contains("Nunca"));

    let document = &outputs[events.len() - 1]["replies"][0];
    assert_eq!(document["type"], "document");
    let filename = document["filename"].as_str().unwrap();
    assert!(filename.starts_with("registros_planilla_"));
    assert!(filename.ends_with(".json"));
    let path = Path::new(document["path"].as_str().unwrap());
    assert!(path.ends_with("registros_planilla.json"));
    assert!(document["caption"].as_str().unwrap().contains("Datos de la nube"));
}

#[test]
fn clear_needs_the_confirmation_phrase() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let mut events = full_form(&id);
    events.extend([
        command(&id, "limpiar_cloud"),
        text(&id, "no"),
        command(&id, "stats"),
        command(&id, "limpiar_cloud"),
        text(&id, "LIMPIAR CLOUD"),
        command(&id, "stats"),
    ]);
    let outputs = run_events(dir.path(), &events);
    let tail = &outputs[outputs.len() - 6..];

    assert!(texts(&tail[0]).contains("¿Limpiar 1 registros?"));
    assert_eq!(texts(&tail[1]), "❌ Limpieza cancelada");
    assert!(texts(&tail[2]).contains("Total registros: 1"));
    assert!(texts(&tail[4]).contains("Registros cloud eliminados"));
    assert!(texts(&tail[5]).contains("Total registros: 0"));

    let log = read_log(dir.path(), "registros_planilla.json");
    assert!(log["metadata"]["cleared"].is_string());
    assert_eq!(log["records"].as_array().unwrap().len(), 0);
    // The backup keeps the last saved state.
    let backup = read_log(dir.path(), "registros_backup.json");
    assert_eq!(backup["records"].as_array().unwrap().len(), 1);
}

#[test]
fn failed_save_keeps_the_form_for_retry() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    let mut events = full_form(&id);
    let last = events.pop().unwrap();
    run_events(dir.path(), &events);

    let main = dir.path().join("registros_planilla.json");
    let healthy = fs::read_to_string(&main).unwrap();
    fs::write(&main, "{ not json").unwrap();

    let outputs = run_events(dir.path(), &[last, command(&id, "status")]);
    assert!(texts(&outputs[0]).contains("Error guardando en cloud"));
    assert!(texts(&outputs[1]).contains("/guardar"));
    assert_eq!(fs::read_to_string(&main).unwrap(), "{ not json");

    fs::write(&main, healthy).unwrap();
    let outputs = run_events(dir.path(), &[command(&id, "guardar"), command(&id, "guardar")]);
    assert!(texts(&outputs[0]).contains("¡Registro guardado en la nube!"));
    assert!(texts(&outputs[1]).contains("No hay registro pendiente"));
    assert_eq!(read_log(dir.path(), "registros_planilla.json")["metadata"]["total_records"], 1);
}

#[test]
fn idle_form_expires_after_ttl() {
    let dir = tempfile::tempdir().unwrap();
    let id = conversation_id();
    run_events(dir.path(), &[command(&id, "start")]);

    let path = conversation_file(dir.path(), &id);
    let mut state: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    state["last_activity"] = Value::from("2000-01-01T00:00:00");
    fs::write(&path, state.to_string()).unwrap();

    let outputs = run_events(dir.path(), &[text(&id, "hoy")]);
    assert_eq!(texts(&outputs[0]), "Usa /start para comenzar");
}

#[test]
fn zero_ttl_keeps_idle_forms() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("planilla.toml"), "session_ttl_minutes = 0\n").unwrap();
    let id = conversation_id();
    run_events(dir.path(), &[command(&id, "start")]);

    let path = conversation_file(dir.path(), &id);
    let mut state: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    state["last_activity"] = Value::from("2000-01-01T00:00:00");
    fs::write(&path, state.to_string()).unwrap();

    let outputs = run_events(dir.path(), &[text(&id, "hoy")]);
    assert!(texts(&outputs[0]).contains("(2/16)"));
}

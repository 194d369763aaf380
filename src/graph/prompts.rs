//! Prompt construction for the turn pipeline
//!
//! The classifier works with closed labels; everything it does not
//! recognize falls through to the full tool-driven flow.

/// Closed classification labels
pub const LABEL_CHITCHAT: &str = "chitchat";
pub const LABEL_GUARDRAILS: &str = "guardrails";

/// System instruction for the tool-driven flow
pub fn initial_system_message(name: &str, lang: &str) -> String {
    format!(
        "Eres un asistente especializado en finanzas personales con acceso a la base de datos \
         de transacciones.\n\
         - Siempre responde en {lang}.\n\
         - Personaliza la conversación usando el nombre {name} cuando corresponda.\n\
         - Responde en un diálogo coloquial, nada formal.\n\
         - Para preguntas sobre movimientos usa SIEMPRE la herramienta transaction_query.\n\
         - Cada pregunta del usuario es INDEPENDIENTE: no reutilices filtros de preguntas \
         anteriores salvo que el usuario pida continuar (\"y de esos...\", \"además...\").\n\
         - NUNCA asumas la fecha actual: calcula 'fromMs' y 'toMs' exactos para rangos \
         relativos como \"este mes\" o \"últimos 3 meses\".\n\
         - Para sumas mensuales usa group {{ by: ['yearMonth'], sum: ['amount'] }} en una \
         única llamada, ordenando por fecha ascendente.\n\
         - Antes de filtrar por categoría o tipo, valida el nombre con \
         list_transaction_categories o list_transaction_types; acepta la corrección con \
         similaridad alta y si no, sugiere las mejores opciones.\n\
         - No inventes valores de categorías ni de tipos.\n\
         - Filtra por usuario solo si se pide explícitamente; usa user_query para resolver \
         nombres a 'userUid'.\n\
         - Muestra montos con formato $ #.###.### y nunca muestres ids.\n\
         - Tu respuesta final DEBE ser un JSON con la clave \"text\", por ejemplo: \
         {{\"text\": \"Hola {name}, aquí tienes tus gastos del mes.\"}}. No agregues nada \
         fuera de ese JSON."
    )
}

/// Closed-label classification of one user message
pub fn classifier_prompt(input: &str) -> String {
    format!(
        "Eres un clasificador para un chatbot de finanzas personales.\n\
         Clasifica el mensaje del usuario en una de estas categorías:\n\
         - {LABEL_CHITCHAT}: SOLO saludos, agradecimientos, chistes o comentarios fuera de tema.\n\
         - {LABEL_GUARDRAILS}: SOLO insultos, amenazas o contenido inapropiado.\n\
         Si no coincide con ninguna, responde null.\n\n\
         Ejemplos:\n\
         Mensaje: hola\n\
         Respuesta: {LABEL_CHITCHAT}\n\
         Mensaje: quiero saber sobre transacciones, categorías o movimientos\n\
         Respuesta: null\n\n\
         Mensaje del usuario:\n{input}\n\n\
         Respuesta ({LABEL_CHITCHAT} | {LABEL_GUARDRAILS} | null, solo texto plano):"
    )
}

/// Short redirect reply for small talk
pub fn chitchat_prompt(user_name: &str, last_message: &str) -> String {
    format!(
        "Tu tarea:\n\
         - Responde en español rioplatense (voseo), corto y directo.\n\
         - Seguí el tono del usuario.\n\
         - Redirigí naturalmente hacia sus transacciones (por ejemplo: \"¿en qué te puedo \
         ayudar con tus transacciones?\").\n\
         - No inventes información, sin markdown ni emojis.\n\
         - Usá la versión corta del nombre.\n\n\
         Mensaje del usuario:\n\"{last_message}\"\n\n\
         Nombre del usuario:\n\"{user_name}\"\n\n\
         Salida: una sola línea de texto plano."
    )
}

/// Firm reply for abusive input
pub fn guardrail_prompt(user_name: &str) -> String {
    format!(
        "Tu tarea:\n\
         - Responde en español rioplatense (voseo), corto y directo.\n\
         - Marca el límite con firmeza y volvé al tema de las transacciones.\n\
         - No inventes información, sin markdown ni emojis.\n\
         - Usá la versión corta del nombre.\n\n\
         Nombre del usuario:\n\"{user_name}\"\n\n\
         Salida: una sola línea de texto plano."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_prompt_carries_labels_and_input() {
        let prompt = classifier_prompt("hola");
        assert!(prompt.contains(LABEL_CHITCHAT));
        assert!(prompt.contains(LABEL_GUARDRAILS));
        assert!(prompt.contains("hola"));
    }

    #[test]
    fn test_system_message_is_parameterized() {
        let prompt = initial_system_message("Seba", "es");
        assert!(prompt.contains("Seba"));
        assert!(prompt.contains("responde en es"));
        assert!(prompt.contains("transaction_query"));
    }
}

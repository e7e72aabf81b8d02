use crate::db_types::ChatMessage;

use time::format_description::well_known::Rfc3339;

pub const CSV_HEADER: &[&str] = &[
    "created_at",
    "from_phone",
    "to_phone",
    "user_text",
    "response_text",
    "latency_ms",
    "delivery_status",
    "message_sid",
    "outbound_message_sid",
];

/// Free text goes into single CSV cells; newlines become spaces so one row
/// stays one line.
fn flatten(text: &Option<String>) -> String {
    text.as_deref()
        .unwrap_or("")
        .replace("\r\n", " ")
        .replace('\n', " ")
}

/// Serialize messages to CSV bytes.  Quoting and comma escaping are the `csv`
/// crate's job; ordering is the caller's.
pub fn messages_to_csv(messages: &[ChatMessage]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;
    for m in messages {
        let created_at = m
            .created_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| m.created_at.to_string());
        writer.write_record(&[
            created_at,
            m.from_phone.clone(),
            m.to_phone.clone(),
            flatten(&m.user_text),
            flatten(&m.response_text),
            m.latency_ms.to_string(),
            m.delivery_status.clone().unwrap_or_default(),
            m.message_sid.clone(),
            m.outbound_message_sid.clone().unwrap_or_default(),
        ])?;
    }
    writer.into_inner().map_err(|e| {
        csv::Error::from(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })
}

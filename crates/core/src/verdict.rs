/// Human-readable verdict for a likeliness percentage.
///
/// `brand` is left out of the sentence when it is `"Unknown"`.
pub fn conclusion(percent: u8, brand: &str) -> String {
    let subject = if brand == "Unknown" { "a VM".to_string() } else { format!("a {brand} VM") };
    match percent {
        0 => "Running in baremetal".to_string(),
        1..=20 => "Very unlikely a VM".to_string(),
        21..=35 => "Unlikely a VM".to_string(),
        36..=49 => format!("Potentially {subject}"),
        50..=62 => format!("Might be {subject}"),
        63..=75 => format!("Likely {subject}"),
        76..=99 => format!("Very likely {subject}"),
        _ => format!("Running inside {subject}"),
    }
}

//! Kernel lookup by scanning WGSL source
//!
//! Compute pipelines are built lazily, so a misspelled kernel name has to be
//! caught before naga ever sees it. The scan is line based and only
//! understands the attribute layout the bundled shaders use.

/// True when `source` declares `fn <name>(` with an `@compute` attribute above it
pub fn has_compute_entry_point(source: &str, name: &str) -> bool {
    let pattern = format!("fn {}(", name);
    let lines: Vec<&str> = source.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if !trimmed.starts_with(&pattern) && !trimmed.contains(&format!(" {}", pattern)) {
            continue;
        }

        if trimmed.contains("@compute") {
            return true;
        }

        // Walk back over attribute lines and comments
        for previous in lines[..i].iter().rev() {
            let previous = previous.trim();
            if previous.is_empty() || previous.starts_with("//") {
                continue;
            }
            if previous.starts_with('@') {
                if previous.contains("@compute") {
                    return true;
                }
                continue;
            }
            break;
        }
        return false;
    }

    false
}

/// Names of every `@compute` function in `source`, for error messages
pub fn compute_entry_points(source: &str) -> Vec<String> {
    function_names(source)
        .into_iter()
        .filter(|name| has_compute_entry_point(source, name))
        .collect()
}

fn function_names(source: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            let start = trimmed.find("fn ")? + 3;
            let end = trimmed[start..].find('(')?;
            let name = trimmed[start..start + end].trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

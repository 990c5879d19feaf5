//! The diagnosis prompt.
//!
//! The prompt carries the condensed profile, the five cleaning rules and the
//! exact response contract. [`super::response::parse_diagnosis`] enforces
//! the same contract on the way back.

use super::condense::condense;
use crate::types::Profile;

/// The cleaning rules, in the order the model should apply them.
pub const CLEANING_RULES: [&str; 5] = [
    "If missing > 50%, drop column.",
    "If numeric & skewed (|skew| > 1), impute median.",
    "If numeric & normal, impute mean.",
    "If categorical, impute mode.",
    "Cap outliers using IQR (Q1 - 1.5*IQR, Q3 + 1.5*IQR).",
];

const RESPONSE_FORMAT: &str = r#"{
    "diagnosis_summary": "Brief text summary of issues.",
    "strategies_defined": [
        {"column": "ColName", "issue": "Missing", "action": "Drop"}
    ],
    "generated_python_code": "import pandas as pd\nimport numpy as np\ndef clean_data(df):\n    # Write code here\n    return df"
}"#;

/// Build the prompt for one profile.
///
/// Fails only if the condensed profile cannot be rendered as JSON.
pub fn build_diagnosis_prompt(profile: &Profile) -> serde_json::Result<String> {
    let condensed = serde_json::to_string_pretty(&condense(profile))?;

    let mut prompt = String::with_capacity(condensed.len() + 1024);
    prompt.push_str(
        "You are the Auto Data Doctor. Analyze this dataset profile and output a python cleaning script.\n\n",
    );
    prompt.push_str("DATA PROFILE:\n");
    prompt.push_str(&condensed);
    prompt.push_str("\n\nRULES:\n");
    for (i, rule) in CLEANING_RULES.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, rule));
    }
    prompt.push_str(
        "\nCODE REQUIREMENTS:\n\
         - Define a function clean_data(df) that returns the cleaned pandas DataFrame.\n\
         - Use only pandas (as pd) and numpy (as np). No other imports.\n\
         - Do not read or write files, access the network, or print.\n",
    );
    prompt.push_str("\nRESPONSE FORMAT (Strict JSON, exactly these three fields):\n");
    prompt.push_str(RESPONSE_FORMAT);
    prompt.push('\n');

    Ok(prompt)
}

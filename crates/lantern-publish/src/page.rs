//! The script block appended to the owner UI page.
//!
//! The UI file is served verbatim and deliberately lacks its closing tags;
//! the binary appends a script block populating `categories[]`,
//! `services[]` and optionally `errorMsg`, then closes the document.

use lantern_store::{Category, Service};

/// Renders the trailing script block. String values are JSON-escaped for
/// the JavaScript string-literal syntax, with `</` additionally escaped so
/// catalog data can never emit a literal `</script` and close the tag the
/// block lives in.
pub fn script_block(
    categories: &[Category],
    services: &[Service],
    error: Option<&str>,
) -> String {
    let mut block = String::from("<script type=\"text/javascript\">\n");

    block.push_str("categories = new Array();\n");
    for (i, category) in categories.iter().enumerate() {
        block.push_str(&format!(
            "categories[{i}] = new Category({}, {});\n",
            category.id,
            js_string(&category.name)
        ));
    }

    block.push_str("services = new Array();\n");
    for (i, service) in services.iter().enumerate() {
        block.push_str(&format!(
            "services[{i}] = new Service({}, {}, {}, {});\n",
            service.cat_id,
            js_string(&service.uri),
            js_opt_string(service.desc.as_deref()),
            js_opt_string(service.long_desc.as_deref()),
        ));
    }

    if let Some(message) = error {
        block.push_str(&format!("errorMsg = {};\n", js_string(message)));
    }

    block.push_str("</script></body></html>");
    block
}

fn js_string(value: &str) -> String {
    // JSON escaping covers quotes and control characters, but the HTML
    // parser is still live inside a <script> element: a literal "</script"
    // in the data would end the block early and turn the rest of the value
    // into markup. "<\/" is the same string to the JS engine.
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn js_opt_string(value: Option<&str>) -> String {
    match value {
        Some(value) => js_string(value),
        None => "null".to_string(),
    }
}

//! Confluence wiki markup: prompts, fixed page bodies and page titles.

use std::path::{Component, Path};

pub const CODE_START: &str = "---- START OF CODE ----";
pub const CODE_END: &str = "---- END OF CODE ----";

/// System prompt for the documentation model.
pub const SYSTEM_PROMPT: &str =
    "You are an expert technical writer generating Confluence Wiki Markup documentation for Python code.";

/// User prompt asking for documentation of one file.
pub fn user_prompt(file_content: &str, file_path: &str) -> String {
    format!(
        "Act as an expert technical writer. Analyze the following Python code from the file '{file_path}'.
Generate documentation in Confluence Wiki Markup format.

The documentation should include:
1. *File Overview:* a concise summary of the file's purpose, its main components and the key dependencies it implies.
2. *Classes (if any):* for each class, its name and signature (e.g. `h3. Class: MyClass(BaseClass)`), its purpose, its key attributes, and every method (including `__init__`) with signature (e.g. `h4. Method: my_method(self, param1, param2=None)`), purpose, parameters (e.g. `* param1 (int): Description.`) and return value (e.g. `* Returns: (str) Description.`).
3. *Functions (if any, outside classes):* for each function, its signature (e.g. `h3. Function: my_function(param1)`), purpose, parameters and return value.
4. *Usage Example (optional):* a short snippet showing how to use a key function or class.

Use Confluence Wiki Markup:
- Headings: `h1.`, `h2.`, `h3.`, `h4.`
- Bold: `*text*`
- Italics: `_text_`
- Unordered lists: `* item`
- Code blocks: `{{code:python}} ... {{code}}` or `{{noformat}} ... {{noformat}}`

Here is the code content:
{CODE_START}
{file_content}
{CODE_END}

Provide only the Confluence Wiki Markup content for the page body."
    )
}

/// Body of the root documentation page.
pub fn root_page_body(title: &str, code_root_path: &str) -> String {
    format!(
        "h1. {title}\n\nThis page is the root for automatically generated documentation for the project. It covers code found in the '{code_root_path}' directory."
    )
}

/// Body of a directory page.
pub fn directory_page_body(dir_name: &str) -> String {
    format!(
        "h1. Directory: {dir_name}\n\nThis page contains documentation for modules and subdirectories within '{dir_name}'."
    )
}

/// Page body used when the model call fails outright.
pub fn error_body(file_path: &str, error: &str) -> String {
    format!(
        "h2. Error Generating Documentation\n\nAn error occurred while generating AI documentation for {file_path}:\n{{noformat}}\n{error}\n{{noformat}}"
    )
}

/// Page body used when every attempt was rate limited.
pub fn retries_exhausted_body(file_path: &str) -> String {
    format!(
        "h2. Error Generating Documentation\n\nFailed to retrieve documentation from OpenAI for {file_path} after multiple retries due to rate limiting or other API issues."
    )
}

/// Title of a directory page: `<root>: a / b`.
pub fn directory_title(root_title: &str, relative: &Path) -> String {
    format!("{root_title}: {}", path_segments(relative).join(" / "))
}

/// Title of a file page: `<root>: a/b/file.py`.
pub fn file_title(root_title: &str, relative: &Path) -> String {
    format!("{root_title}: {}", display_path(relative))
}

/// `/`-joined relative path, independent of the host separator.
pub fn display_path(relative: &Path) -> String {
    path_segments(relative).join("/")
}

fn path_segments(relative: &Path) -> Vec<String> {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_titles() {
        let dir = PathBuf::from("utils/math");
        assert_eq!(directory_title("Docs", &dir), "Docs: utils / math");
        assert_eq!(
            file_title("Docs", &dir.join("calc.py")),
            "Docs: utils/math/calc.py"
        );
        assert_eq!(file_title("Docs", Path::new("main.py")), "Docs: main.py");
    }

    #[test]
    fn test_prompt_embeds_code_between_markers() {
        let prompt = user_prompt("def f():\n    return 1\n", "pkg/mod.py");
        let start = prompt.find(CODE_START).unwrap();
        let end = prompt.find(CODE_END).unwrap();
        assert!(start < end);
        assert!(prompt[start..end].contains("return 1"));
        assert!(prompt.contains("'pkg/mod.py'"));
        assert!(prompt.contains("{code:python}"));
    }

    #[test]
    fn test_fixed_bodies() {
        assert!(root_page_body("Docs", "app").starts_with("h1. Docs\n\n"));
        assert!(root_page_body("Docs", "app").contains("'app' directory"));
        assert_eq!(
            directory_page_body("utils"),
            "h1. Directory: utils\n\nThis page contains documentation for modules and subdirectories within 'utils'."
        );
    }

    #[test]
    fn test_error_bodies() {
        let body = error_body("main.py", "boom");
        assert!(body.starts_with("h2. Error Generating Documentation"));
        assert!(body.contains("{noformat}\nboom\n{noformat}"));
        assert!(retries_exhausted_body("main.py").contains("after multiple retries"));
    }
}

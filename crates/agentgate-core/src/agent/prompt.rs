//! System prompt assembly

use crate::types::{function_name, ToolDescriptor};

const BASE_INSTRUCTIONS: &str = "You are a helpful assistant that can act on the user's machine through tools.\n\
Use a tool whenever the request needs file contents, directory listings or command output; \
never guess what a tool would return.\n\
Paths may be absolute or relative to the workspace. Keep answers short and report tool errors plainly.";

/// Build the system prompt: static instructions, the tool catalogue under the
/// names the model calls them by, then the skills section (separated by a
/// blank line) when there is one.
pub fn build_system_prompt(tools: &[ToolDescriptor], skills_section: &str) -> String {
    let mut prompt = String::from(BASE_INSTRUCTIONS);

    if !tools.is_empty() {
        prompt.push_str("\n\nAvailable tools:\n");
        for tool in tools {
            let name = function_name(&tool.name);
            if tool.description.is_empty() {
                prompt.push_str(&format!("- {}\n", name));
            } else {
                prompt.push_str(&format!("- {}: {}\n", name, tool.description));
            }
        }
    }

    let skills_section = skills_section.trim_end();
    if !skills_section.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(skills_section);
    }

    prompt
}

// ABOUTME: System prompt for the coding agent
// ABOUTME: Appends the files written so far so the model sees the current file state

use codingcat_core::FileMap;

pub const CONTINUE_PROMPT: &str = "Continue working on the task. Use the tools to make progress, \
and reply with <task_summary> once everything is done.";

const SYSTEM_PROMPT: &str = r#"You are a senior software engineer working in a sandboxed Next.js environment.

Environment:
- The project lives in /home/user and a development server is already running on port 3000 with hot reload.
- Use the terminal tool to install packages (for example `npm install <package> --yes`). Never start or restart the dev server yourself, and never run `npm run dev`, `npm run build`, or `npm run start`.
- Use createOrUpdateFiles to write files. Paths must be relative to /home/user, such as "app/page.tsx". Never use absolute paths.
- Use readFiles to inspect existing files before you change them.
- The main page is app/page.tsx. Add "use client" to files that use React hooks or browser APIs.
- Style with Tailwind CSS classes only. Do not create .css, .scss, or .sass files.

Instructions:
1. Build a complete, production-quality feature for the request. Avoid placeholders and TODOs.
2. Work step by step with the tools. Tool results report failures as text; read them and correct course.
3. Do not print code in your replies. All code goes through the tools.

When the task is fully complete, reply with a short summary wrapped exactly like this and nothing after it:

<task_summary>
A short, high-level description of what was built or changed.
</task_summary>

Only emit <task_summary> once, at the very end. Omitting it means the task is not finished."#;

/// Full system prompt including the current file state
pub fn system_prompt(files: &FileMap) -> String {
    if files.is_empty() {
        return format!("{}\n\nFiles written so far: none.", SYSTEM_PROMPT);
    }

    let listing: Vec<String> = files.keys().map(|path| format!("- {}", path)).collect();
    format!(
        "{}\n\nFiles written so far:\n{}",
        SYSTEM_PROMPT,
        listing.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_mentions_marker() {
        assert!(system_prompt(&FileMap::new()).contains("<task_summary>"));
        assert!(system_prompt(&FileMap::new()).ends_with("Files written so far: none."));
    }

    #[test]
    fn test_prompt_lists_files() {
        let mut files = FileMap::new();
        files.insert("app/page.tsx".to_string(), "x".to_string());
        files.insert("lib/utils.ts".to_string(), "y".to_string());

        let prompt = system_prompt(&files);
        assert!(prompt.ends_with("- app/page.tsx\n- lib/utils.ts"));
    }
}

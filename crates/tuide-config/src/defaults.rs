//! Built-in defaults, the lowest precedence tier.

use serde_json::json;

use crate::source::ConfigTree;

pub fn tree() -> ConfigTree {
    json!({
        "theme": {
            "background": "#1e1e1e",
            "foreground": "#d4d4d4",
            "accent": "#569cd6",
            "error": "#f44747",
            "warning": "#cca700"
        },
        "file_associations": {
            "py": "python",
            "rs": "rust",
            "js": "javascript",
            "ts": "typescript",
            "md": "markdown",
            "json": "json",
            "sh": "shell"
        },
        "lsp_servers": {
            "python": { "command": ["pylsp"], "enabled": true },
            "rust": { "command": ["rust-analyzer"], "enabled": true },
            "typescript": { "command": ["typescript-language-server", "--stdio"], "enabled": false }
        },
        "editor_settings": {
            "tab_size": 4,
            "insert_spaces": true,
            "line_numbers": true,
            "word_wrap": false
        },
        "runner": {
            "shell": true,
            "grace_period_ms": 3000
        },
        "python": {
            "interpreter": "python3",
            "run": "%config:python.interpreter% %current_file_path%",
            "debug": "%config:python.interpreter% -m pdb %current_file_path%",
            "test": "%config:python.interpreter% -m pytest %workspace_root%"
        },
        "rust": {
            "run": "cargo run --manifest-path %workspace_root%/Cargo.toml",
            "debug": "rust-gdb %workspace_root%/target/debug/%config:rust.binary%",
            "test": "cargo test --manifest-path %workspace_root%/Cargo.toml",
            "binary": "main"
        },
        "javascript": {
            "run": "node %current_file_path%",
            "debug": "node --inspect-brk %current_file_path%",
            "test": "npm test --prefix %workspace_root%"
        },
        "shell": {
            "run": "sh %current_file_path%"
        },
        "macros": {},
        "templates": {
            "python": {
                "script": {
                    "trigger": "*.py",
                    "content": "#!/usr/bin/env python3\n\"\"\"%current_file_name%\"\"\"\n\n\ndef main():\n    pass\n\n\nif __name__ == \"__main__\":\n    main()\n"
                }
            },
            "shell": {
                "script": {
                    "trigger": "*.sh",
                    "content": "#!/bin/sh\n# %current_file_name%\nset -eu\n"
                }
            }
        }
    })
}

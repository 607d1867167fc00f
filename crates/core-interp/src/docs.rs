//! Documentation registry: qualified name → `{signature, description}`.
//!
//! Lookup is exact first, then by dotted suffix (`read` finds `file.read`); when several keys
//! share the suffix the first in registry order wins. Registry order is file order for a loaded
//! registry and declaration order for the built-in set.

use crate::ident::qualified_ident_at;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DocEntry {
    pub signature: String,
    #[serde(default)]
    pub description: String,
}

/// One record of a registry file: `[{"name": "...", "signature": "...", "description": "..."}]`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DocRecord {
    pub name: String,
    #[serde(flatten)]
    pub entry: DocEntry,
}

#[derive(Debug, Clone, Default)]
pub struct DocRegistry {
    entries: Vec<(String, DocEntry)>,
    longest_first: Vec<String>,
}

const BUILTIN_DOCS: &[(&str, &str, &str)] = &[
    ("print", "print(*args)", "Write values to the task output."),
    ("len", "len(x) -> int", "Number of items in a sequence or mapping."),
    ("range", "range(start, stop=None, step=1) -> list", "Arithmetic progression of ints."),
    ("str", "str(x) -> str", "String conversion."),
    ("int", "int(x) -> int", "Integer conversion."),
    ("bool", "bool(x) -> bool", "Truth value of x."),
    ("list", "list(iterable=None) -> list", "New list."),
    ("dict", "dict(**kwargs) -> dict", "New dictionary."),
    ("type", "type(x) -> str", "Name of the value's type."),
    ("dir", "dir(x=None) -> list", "Attributes of x, or names in scope."),
    ("sorted", "sorted(iterable, reverse=False) -> list", "Sorted copy."),
    ("enumerate", "enumerate(iterable) -> list", "Index/value pairs."),
    ("assert", "assert(cond, msg=None)", "Fail the task when cond is false."),
    ("agent.get_config", "agent.get_config() -> dict", "Current agent configuration."),
    ("agent.set_callback_interval", "agent.set_callback_interval(seconds: int)", "Change the check-in interval."),
    ("assets.list", "assets.list() -> list", "Names of embedded assets."),
    ("assets.read", "assets.read(name: str) -> str", "Contents of an embedded asset."),
    ("crypto.md5", "crypto.md5(data: bytes) -> str", "Hex MD5 digest."),
    ("crypto.sha256", "crypto.sha256(data: bytes) -> str", "Hex SHA-256 digest."),
    ("file.append", "file.append(path: str, content: str)", "Append content, creating the file if needed."),
    ("file.copy", "file.copy(src: str, dst: str)", "Copy a file, overwriting dst."),
    ("file.exists", "file.exists(path: str) -> bool", "Whether the path exists."),
    ("file.list", "file.list(path: str) -> list", "Directory entries with metadata."),
    ("file.mkdir", "file.mkdir(path: str, parent=False)", "Create a directory."),
    ("file.read", "file.read(path: str) -> str", "Read a text file."),
    ("file.read_binary", "file.read_binary(path: str) -> bytes", "Read a file as bytes."),
    ("file.remove", "file.remove(path: str)", "Delete a file or directory tree."),
    ("file.write", "file.write(path: str, content: str)", "Overwrite a file."),
    ("http.get", "http.get(uri: str, headers=None) -> dict", "HTTP GET request."),
    ("http.post", "http.post(uri: str, body=None, headers=None) -> dict", "HTTP POST request."),
    ("pivot.port_scan", "pivot.port_scan(targets: list, ports: list, protocol: str) -> list", "Scan ports on targets."),
    ("process.info", "process.info(pid=None) -> dict", "Details for one process."),
    ("process.kill", "process.kill(pid: int)", "Terminate a process."),
    ("process.list", "process.list() -> list", "Running processes."),
    ("random.int", "random.int(min: int, max: int) -> int", "Uniform random integer."),
    ("regex.match", "regex.match(haystack: str, pattern: str) -> str", "First capture of pattern."),
    ("report.file", "report.file(path: str)", "Upload a file to the server."),
    ("sys.exec", "sys.exec(path: str, args: list) -> dict", "Run a program without a shell."),
    ("sys.get_env", "sys.get_env() -> dict", "Environment variables."),
    ("sys.get_os", "sys.get_os() -> dict", "Operating system details."),
    ("sys.hostname", "sys.hostname() -> str", "Host name."),
    ("sys.shell", "sys.shell(cmd: str) -> dict", "Run a command through the system shell."),
    ("time.now", "time.now() -> int", "Unix timestamp in seconds."),
    ("time.sleep", "time.sleep(secs: int)", "Pause the task."),
];

impl DocRegistry {
    pub fn new(entries: Vec<(String, DocEntry)>) -> Self {
        let mut longest_first: Vec<String> = entries.iter().map(|(k, _)| k.clone()).collect();
        // Stable sort keeps registry order among equal lengths.
        longest_first.sort_by_key(|k| std::cmp::Reverse(k.len()));
        longest_first.dedup();
        Self {
            entries,
            longest_first,
        }
    }

    /// The default set shipped with the embedded interpreter.
    pub fn builtin() -> Self {
        Self::new(
            BUILTIN_DOCS
                .iter()
                .map(|(name, sig, desc)| {
                    (
                        name.to_string(),
                        DocEntry {
                            signature: sig.to_string(),
                            description: desc.to_string(),
                        },
                    )
                })
                .collect(),
        )
    }

    pub(crate) fn from_records(records: Vec<DocRecord>) -> Self {
        Self::new(records.into_iter().map(|r| (r.name, r.entry)).collect())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Registry names ordered longest first, for prefix-safe matching.
    pub fn names_longest_first(&self) -> &[String] {
        &self.longest_first
    }

    pub fn lookup(&self, name: &str) -> Option<(&str, &DocEntry)> {
        if name.is_empty() {
            return None;
        }
        if let Some((k, v)) = self.entries.iter().find(|(k, _)| k == name) {
            return Some((k.as_str(), v));
        }
        self.entries
            .iter()
            .find(|(k, _)| {
                k.len() > name.len()
                    && k.ends_with(name)
                    && k.as_bytes()[k.len() - name.len() - 1] == b'.'
            })
            .map(|(k, v)| (k.as_str(), v))
    }

    /// Documentation for the dotted identifier spanning `cursor` in `line`.
    pub fn lookup_at(&self, line: &str, cursor: usize) -> Option<(&str, &DocEntry)> {
        let ident = qualified_ident_at(line, cursor)?;
        self.lookup(ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sig: &str) -> DocEntry {
        DocEntry {
            signature: sig.into(),
            description: String::new(),
        }
    }

    #[test]
    fn exact_then_suffix_lookup() {
        let reg = DocRegistry::new(vec![
            ("file.read".into(), entry("a")),
            ("assets.read".into(), entry("b")),
            ("read".into(), entry("c")),
        ]);
        assert_eq!(reg.lookup("read").map(|(k, _)| k), Some("read"));
        assert_eq!(reg.lookup("file.read").map(|(k, _)| k), Some("file.read"));

        let reg = DocRegistry::new(vec![
            ("file.read".into(), entry("a")),
            ("assets.read".into(), entry("b")),
        ]);
        // First in registry order wins among suffix matches.
        assert_eq!(reg.lookup("read").map(|(k, _)| k), Some("file.read"));
        // Suffix must align on a dot boundary.
        assert_eq!(reg.lookup("ead"), None);
    }

    #[test]
    fn longest_first_ordering() {
        let reg = DocRegistry::new(vec![
            ("sys".into(), entry("")),
            ("sys.shell".into(), entry("")),
            ("sys.exec".into(), entry("")),
        ]);
        assert_eq!(reg.names_longest_first(), ["sys.shell", "sys.exec", "sys"]);
    }

    #[test]
    fn lookup_at_cursor_inside_identifier() {
        let reg = DocRegistry::builtin();
        let (name, doc) = reg.lookup_at("x = file.read(\"/etc\")", 10).unwrap();
        assert_eq!(name, "file.read");
        assert!(doc.signature.starts_with("file.read("));
        let (name, _) = reg.lookup_at("sys.shell('id')", 2).unwrap();
        assert_eq!(name, "sys.shell");
        assert!(reg.lookup_at("   ", 1).is_none());
    }

    #[test]
    fn records_deserialize_in_file_order() {
        let json = r#"[{"name":"b.x","signature":"x()"},{"name":"a.x","signature":"y()","description":"d"}]"#;
        let records: Vec<DocRecord> = serde_json::from_str(json).unwrap();
        let reg = DocRegistry::from_records(records);
        assert_eq!(reg.names().collect::<Vec<_>>(), ["b.x", "a.x"]);
        assert_eq!(reg.lookup("x").map(|(k, _)| k), Some("b.x"));
    }
}

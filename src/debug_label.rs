/// Label for resources that shows up in graphics debuggers for easy identification.
#[derive(Clone, Default, Hash, PartialEq, Eq)]
pub struct DebugLabel(Option<String>);

impl DebugLabel {
    pub fn get(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl std::fmt::Debug for DebugLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or("<unlabeled>"))
    }
}

impl From<&str> for DebugLabel {
    fn from(label: &str) -> Self {
        Self(Some(label.to_owned()))
    }
}

impl From<String> for DebugLabel {
    fn from(label: String) -> Self {
        Self(Some(label))
    }
}

impl From<Option<String>> for DebugLabel {
    fn from(label: Option<String>) -> Self {
        Self(label)
    }
}

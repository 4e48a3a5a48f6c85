/// Create/edit form of a registry.
///
/// At most one form is open per registry; opening another replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormState<D> {
    #[default]
    Closed,
    Create {
        draft: D,
    },
    Edit {
        id: String,
        draft: D,
    },
}

impl<D> FormState<D> {
    pub fn is_open(&self) -> bool {
        !matches!(self, FormState::Closed)
    }

    pub fn draft(&self) -> Option<&D> {
        match self {
            FormState::Closed => None,
            FormState::Create { draft } | FormState::Edit { draft, .. } => Some(draft),
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut D> {
        match self {
            FormState::Closed => None,
            FormState::Create { draft } | FormState::Edit { draft, .. } => Some(draft),
        }
    }

    /// Id of the record being edited, if this is an edit form
    pub fn editing_id(&self) -> Option<&str> {
        match self {
            FormState::Edit { id, .. } => Some(id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_form_has_no_draft() {
        let mut form: FormState<String> = FormState::default();
        assert!(!form.is_open());
        assert!(form.draft().is_none());
        assert!(form.draft_mut().is_none());
        assert!(form.editing_id().is_none());
    }

    #[test]
    fn test_edit_form_exposes_id_and_draft() {
        let mut form = FormState::Edit {
            id: "dev-1".to_string(),
            draft: "iPhone".to_string(),
        };
        assert!(form.is_open());
        assert_eq!(form.editing_id(), Some("dev-1"));

        form.draft_mut().unwrap().push_str(" 12");
        assert_eq!(form.draft().map(String::as_str), Some("iPhone 12"));
    }

    #[test]
    fn test_create_form_is_not_editing() {
        let form = FormState::Create { draft: 1u8 };
        assert!(form.is_open());
        assert_eq!(form.editing_id(), None);
        assert_eq!(form.draft(), Some(&1));
    }
}

use crate::model::{Command, Dependency, FeedUri, ImplementationSelection, Restriction, Selections};

/// A point in the search that [`SelectionStack::rollback_to`] can return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    frames: usize,
    edits: usize,
}

/// A change made to a selection below the top of the stack.
#[derive(Debug)]
enum Edit {
    CommandAdded { index: usize, name: String },
    DependencyRemoved {
        index: usize,
        command: Option<String>,
        position: usize,
        dependency: Dependency,
    },
}

/// The selections of one pass together with the restrictions they carry.
///
/// Each committed selection owns one frame recording how many restrictions
/// it pushed. Later changes to a committed selection go through
/// [`add_command`](Self::add_command) and
/// [`remove_dependency`](Self::remove_dependency), which log an edit so
/// that rolling back to a [`Mark`] restores every selection below it.
#[derive(Debug)]
pub(crate) struct SelectionStack {
    selections: Selections,
    restrictions: Vec<Restriction>,
    frames: Vec<usize>,
    edits: Vec<Edit>,
}

impl SelectionStack {
    pub fn new(interface: FeedUri) -> Self {
        Self {
            selections: Selections::new(interface),
            restrictions: Vec::new(),
            frames: Vec::new(),
            edits: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn mark(&self) -> Mark {
        Mark {
            frames: self.frames.len(),
            edits: self.edits.len(),
        }
    }

    pub fn get(&self, interface: &FeedUri) -> Option<&ImplementationSelection> {
        self.selections.get(interface)
    }

    pub fn position(&self, interface: &FeedUri) -> Option<usize> {
        self.selections.position(interface)
    }

    pub fn get_index(&self, index: usize) -> Option<&ImplementationSelection> {
        self.selections.implementations.get(index)
    }

    /// Restrictions placed on `interface` by the committed selections
    pub fn restrictions_on<'s>(&'s self, interface: &'s FeedUri) -> impl Iterator<Item = &'s Restriction> {
        self.restrictions.iter().filter(move |r| &r.interface == interface)
    }

    #[cfg(test)]
    pub fn restriction_count(&self) -> usize {
        self.restrictions.len()
    }

    /// Pushes a selection and its restrictions, returning its index
    pub fn commit(&mut self, selection: ImplementationSelection) -> usize {
        self.restrictions.extend(selection.restrictions.iter().cloned());
        self.frames.push(selection.restrictions.len());
        self.selections.implementations.push(selection);
        self.frames.len() - 1
    }

    /// Adds `command` to the selection at `index`
    pub fn add_command(&mut self, index: usize, command: Command) -> bool {
        let Some(selection) = self.selections.implementations.get_mut(index) else {
            return false;
        };
        self.edits.push(Edit::CommandAdded {
            index,
            name: command.name.clone(),
        });
        selection.commands.push(command);
        true
    }

    /// Drops `dependency` from the selection at `index`, or from its
    /// command `command` when given
    pub fn remove_dependency(&mut self, index: usize, command: Option<&str>, dependency: &Dependency) {
        let Some(list) = self.dependencies_mut(index, command) else {
            return;
        };
        let Some(position) = list.iter().position(|d| d == dependency) else {
            return;
        };
        let dependency = list.remove(position);
        self.edits.push(Edit::DependencyRemoved {
            index,
            command: command.map(String::from),
            position,
            dependency,
        });
    }

    fn dependencies_mut(&mut self, index: usize, command: Option<&str>) -> Option<&mut Vec<Dependency>> {
        let selection = self.selections.implementations.get_mut(index)?;
        match command {
            Some(name) => selection
                .commands
                .iter_mut()
                .find(|c| c.name == name)
                .map(|c| &mut c.dependencies),
            None => Some(&mut selection.dependencies),
        }
    }

    /// Pops exactly the most recent frame
    pub fn rollback(&mut self) {
        if let Some(count) = self.frames.pop() {
            let keep = self.restrictions.len() - count;
            self.restrictions.truncate(keep);
            self.selections.implementations.pop();
        }
    }

    /// Pops frames and reverts edits made since `mark`, newest first
    pub fn rollback_to(&mut self, mark: Mark) {
        while self.frames.len() > mark.frames {
            self.rollback();
        }
        while self.edits.len() > mark.edits {
            let Some(edit) = self.edits.pop() else {
                break;
            };
            self.revert(edit);
        }
    }

    fn revert(&mut self, edit: Edit) {
        match edit {
            Edit::CommandAdded { index, name } => {
                if let Some(selection) = self.selections.implementations.get_mut(index) {
                    if let Some(pos) = selection.commands.iter().rposition(|c| c.name == name) {
                        selection.commands.remove(pos);
                    }
                }
            }
            Edit::DependencyRemoved {
                index,
                command,
                position,
                dependency,
            } => {
                if let Some(list) = self.dependencies_mut(index, command.as_deref()) {
                    list.insert(position.min(list.len()), dependency);
                }
            }
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.frames.len() == self.selections.implementations.len()
            && self.frames.iter().sum::<usize>() == self.restrictions.len()
            && self
                .selections
                .implementations
                .iter()
                .zip(&self.frames)
                .all(|(selection, count)| selection.restrictions.len() == *count)
    }

    pub fn into_selections(self) -> Selections {
        self.selections
    }
}

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::ProtocolError;
use crate::model::{
    Binding, Command, Dependency, EnvironmentBinding, EnvironmentMode, ExecutableBinding, FeedUri,
    GenericBinding, ImplementationSelection, Importance, OverlayBinding, Runner, Selections,
};

/// Parses the selections document an external solver sends after `ok+xml`.
pub fn parse_selections(xml: &str) -> Result<Selections, ProtocolError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut parser = SelectionsParser::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e, false)?,
            Ok(Event::Empty(ref e)) => parser.handle_start(e, true)?,
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|e| ProtocolError::Xml(e.to_string()))?;
                parser.handle_text(&text);
            }
            Ok(Event::End(ref e)) => parser.handle_end(e.local_name().as_ref())?,
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProtocolError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    parser.finish()
}

/// Element attributes by local name
fn attributes(e: &BytesStart<'_>) -> Result<HashMap<String, String>, ProtocolError> {
    let mut map = HashMap::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| ProtocolError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ProtocolError::Xml(e.to_string()))?
            .into_owned();
        map.insert(key, value);
    }
    Ok(map)
}

fn required<'m>(attrs: &'m HashMap<String, String>, element: &str, name: &str) -> Result<&'m str, ProtocolError> {
    attrs
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ProtocolError::Xml(format!("<{}> without {}", element, name)))
}

fn parse_attr<T>(attrs: &HashMap<String, String>, name: &str) -> Result<Option<T>, ProtocolError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    attrs
        .get(name)
        .map(|value| {
            value
                .parse()
                .map_err(|e| ProtocolError::Xml(format!("invalid {} \"{}\": {}", name, value, e)))
        })
        .transpose()
}

fn uri_attr(attrs: &HashMap<String, String>, element: &str, name: &str) -> Result<FeedUri, ProtocolError> {
    FeedUri::parse(required(attrs, element, name)?).map_err(|e| ProtocolError::Xml(e.to_string()))
}

#[derive(Default)]
struct SelectionsParser {
    selections: Option<Selections>,
    selection: Option<ImplementationSelection>,
    command: Option<Command>,
    dependency: Option<Dependency>,
    in_arg: bool,
}

impl SelectionsParser {
    fn handle_start(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ProtocolError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
        let attrs = attributes(e)?;

        match name.as_str() {
            "selections" => {
                let mut selections = Selections::new(uri_attr(&attrs, "selections", "interface")?);
                selections.command = attrs.get("command").cloned();
                self.selections = Some(selections);
            }
            "selection" => {
                let selection = self.parse_selection(&attrs)?;
                self.selection = Some(selection);
            }
            "manifest-digest" => {
                if let Some(ref mut selection) = self.selection {
                    selection.manifest_digest.sha1new = attrs.get("sha1new").cloned();
                    selection.manifest_digest.sha256 = attrs.get("sha256").cloned();
                    selection.manifest_digest.sha256new = attrs.get("sha256new").cloned();
                }
            }
            "command" => {
                let mut command = Command::new(required(&attrs, "command", "name")?);
                command.path = attrs.get("path").cloned();
                command.working_dir = attrs.get("working-dir").cloned();
                self.command = Some(command);
            }
            "runner" => {
                let mut runner = Runner::new(uri_attr(&attrs, "runner", "interface")?);
                runner.command = attrs.get("command").cloned();
                if let Some(ref mut command) = self.command {
                    command.runner = Some(runner);
                }
            }
            "arg" => self.in_arg = !empty,
            "requires" => {
                let mut dependency = Dependency::new(uri_attr(&attrs, "requires", "interface")?);
                if attrs.get("importance").map(String::as_str) == Some("recommended") {
                    dependency.importance = Importance::Recommended;
                }
                dependency.restriction.version = parse_attr(&attrs, "version")?;
                self.dependency = Some(dependency);
            }
            "environment" => {
                let mode = match attrs.get("mode").map(String::as_str) {
                    Some("append") => EnvironmentMode::Append,
                    Some("replace") => EnvironmentMode::Replace,
                    _ => EnvironmentMode::Prepend,
                };
                self.add_binding(Binding::Environment(EnvironmentBinding {
                    name: required(&attrs, "environment", "name")?.to_string(),
                    value: attrs.get("value").cloned(),
                    insert: attrs.get("insert").cloned(),
                    mode,
                    separator: attrs.get("separator").cloned(),
                    default: attrs.get("default").cloned(),
                }));
            }
            "overlay" => self.add_binding(Binding::Overlay(OverlayBinding {
                src: attrs.get("src").cloned(),
                mount_point: attrs.get("mount-point").cloned(),
            })),
            "executable-in-var" | "executable-in-path" => {
                let binding = ExecutableBinding {
                    name: required(&attrs, &name, "name")?.to_string(),
                    command: attrs.get("command").cloned(),
                };
                self.add_binding(if name == "executable-in-var" {
                    Binding::ExecutableInVar(binding)
                } else {
                    Binding::ExecutableInPath(binding)
                });
            }
            "binding" => self.add_binding(Binding::Generic(GenericBinding {
                command: attrs.get("command").cloned(),
                path: attrs.get("path").cloned(),
            })),
            _ => {}
        }

        if empty {
            self.handle_end(name.as_bytes())?;
        }
        Ok(())
    }

    fn parse_selection(&self, attrs: &HashMap<String, String>) -> Result<ImplementationSelection, ProtocolError> {
        let version = parse_attr(attrs, "version")?
            .ok_or_else(|| ProtocolError::Xml("<selection> without version".to_string()))?;
        let mut selection = ImplementationSelection::new(
            uri_attr(attrs, "selection", "interface")?,
            required(attrs, "selection", "id")?,
            version,
        );

        if attrs.contains_key("from-feed") {
            selection.from_feed = Some(uri_attr(attrs, "selection", "from-feed")?);
        }
        if let Some(arch) = parse_attr(attrs, "arch")? {
            selection.architecture = arch;
        }
        if let Some(stability) = parse_attr(attrs, "stability")? {
            selection.stability = stability;
        }
        selection.released = parse_attr(attrs, "released")?;
        selection.license = attrs.get("license").cloned();
        selection.local_path = attrs.get("local-path").cloned();
        selection.distribution = attrs.get("distribution").cloned();
        selection.package = attrs.get("package").cloned();
        selection.quick_test_file = attrs.get("quick-test-file").cloned();
        Ok(selection)
    }

    /// Bindings belong to the innermost open dependency, command or selection
    fn add_binding(&mut self, binding: Binding) {
        if let Some(ref mut dependency) = self.dependency {
            dependency.bindings.push(binding);
        } else if let Some(ref mut command) = self.command {
            command.bindings.push(binding);
        } else if let Some(ref mut selection) = self.selection {
            selection.bindings.push(binding);
        }
    }

    fn handle_text(&mut self, text: &str) {
        if self.in_arg {
            if let Some(ref mut command) = self.command {
                command.arguments.push(text.to_string());
            }
        }
    }

    fn handle_end(&mut self, name: &[u8]) -> Result<(), ProtocolError> {
        match name {
            b"arg" => self.in_arg = false,
            b"requires" => {
                if let Some(dependency) = self.dependency.take() {
                    if let Some(ref mut command) = self.command {
                        command.dependencies.push(dependency);
                    } else if let Some(ref mut selection) = self.selection {
                        selection.dependencies.push(dependency);
                    }
                }
            }
            b"command" => {
                if let (Some(command), Some(selection)) = (self.command.take(), self.selection.as_mut()) {
                    selection.commands.push(command);
                }
            }
            b"selection" => {
                let selection = self
                    .selection
                    .take()
                    .ok_or_else(|| ProtocolError::Xml("unbalanced </selection>".to_string()))?;
                let selections = self
                    .selections
                    .as_mut()
                    .ok_or_else(|| ProtocolError::Xml("<selection> outside <selections>".to_string()))?;
                selections.implementations.push(selection);
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self) -> Result<Selections, ProtocolError> {
        self.selections
            .ok_or_else(|| ProtocolError::Xml("missing <selections> element".to_string()))
    }
}

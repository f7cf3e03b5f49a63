//! Widget node construction. Nodes come back detached; the caller hands
//! them to the grid library, which attaches them under the grid root.

use crate::dom::{Document, NodeId};
use crate::engine::config::EngineConfig;
use crate::model::{DeclaredPlacement, WidgetPlacement};

/// Build a complete widget node: identity on all three markers, geometry
/// attributes, a titled header with the delete affordance, and a type-keyed
/// body the host renders into.
pub fn build_widget(
    doc: &mut Document,
    config: &EngineConfig,
    placement: &WidgetPlacement,
    title: &str,
) -> NodeId {
    let node = doc.create_element("div");
    doc.add_class(node, &config.widget_class);
    doc.set_attr(node, "id", placement.id.clone());
    doc.set_attr(node, "data-widget-id", placement.id.clone());
    doc.set_attr(node, "gs-id", placement.id.clone());
    doc.set_attr(node, "data-widget-type", placement.kind.as_str());
    doc.set_attr(node, "gs-x", placement.x.to_string());
    doc.set_attr(node, "gs-y", placement.y.to_string());
    doc.set_attr(node, "gs-w", placement.w.to_string());
    doc.set_attr(node, "gs-h", placement.h.to_string());

    let content = doc.create_element("div");
    doc.add_class(content, &config.content_class);
    doc.append_child(node, content);

    let header = doc.create_element("div");
    doc.add_class(header, &config.header_class);
    doc.set_text(header, title);
    doc.append_child(content, header);

    let remove = doc.create_element("button");
    doc.add_class(remove, &config.remove_class);
    doc.set_text(remove, "\u{00d7}");
    doc.append_child(header, remove);

    let body = doc.create_element("div");
    doc.add_class(body, &config.body_class);
    doc.add_class(
        body,
        &format!("{}--{}", config.body_class, placement.kind.as_str()),
    );
    doc.append_child(content, body);

    node
}

/// Build a loading placeholder for a declared widget whose real node has
/// not been rendered yet. Carries the placeholder marker so aggressive
/// cleanup leaves it alone.
pub fn build_placeholder(
    doc: &mut Document,
    config: &EngineConfig,
    declared: &DeclaredPlacement,
) -> NodeId {
    let title = declared.title.clone().unwrap_or_else(|| declared.id.clone());
    let node = build_widget(doc, config, &declared.placement(), &title);
    doc.add_class(node, &config.placeholder_class);

    // Swap the empty body for a loading hint.
    if let Some(content) = doc.children(node).first().copied() {
        if let Some(body) = doc
            .children(content)
            .iter()
            .copied()
            .find(|n| doc.has_class(*n, &config.body_class))
        {
            doc.set_text(body, "Loading\u{2026}");
        }
    }
    node
}

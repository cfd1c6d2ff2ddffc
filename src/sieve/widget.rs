/// Hook for editor front ends.
///
/// The engine never renders anything. A front end implements
/// [`WidgetBuilder`] and is handed every node bottom-up, so it can turn
/// the tree into its own controls while the nodes stay the source of truth.
use crate::sieve::ast::Node;

pub trait WidgetBuilder {
    type Widget;

    /// Builds the widget for `node` from the widgets of its children.
    /// Returning `None` leaves the node out, e.g. for whitespace.
    fn build(&mut self, node: &dyn Node, children: Vec<Self::Widget>) -> Option<Self::Widget>;
}

pub fn build_widget<B: WidgetBuilder + ?Sized>(builder: &mut B, node: &dyn Node) -> Option<B::Widget> {
    let children = node
        .children()
        .into_iter()
        .filter_map(|child| build_widget(builder, child))
        .collect();
    builder.build(node, children)
}

pub fn build_widgets<B: WidgetBuilder + ?Sized>(
    builder: &mut B,
    nodes: &[Box<dyn Node>],
) -> Vec<B::Widget> {
    nodes
        .iter()
        .filter_map(|node| build_widget(builder, node.as_ref()))
        .collect()
}

pub mod draw;

use bevy::{app::PluginGroupBuilder, prelude::*};
use bevy_prototype_debug_lines::DebugLinesPlugin;

#[derive(Debug)]
/// Development plugins intended for debug builds use.
pub struct DeveloperPlugins;

impl PluginGroup for DeveloperPlugins {
    fn build(self) -> PluginGroupBuilder {
        let group = PluginGroupBuilder::start::<Self>()
            .add(DebugLinesPlugin::with_depth_test(true))
            .add(DebugDrawPlugin);

        #[cfg(feature = "editor")]
        let group = group
            .add(bevy_editor_pls::prelude::EditorPlugin)
            .add(bevy_inspector_egui_rapier::InspectableRapierPlugin);

        group
    }
}

#[derive(Debug)]
pub struct DebugDrawPlugin;

impl Plugin for DebugDrawPlugin {
    fn build(&self, app: &mut App) {
        app.add_system(draw::draw_projectiles);
    }
}

use bevy::prelude::*;
use leafwing_input_manager::prelude::*;

#[derive(Debug)]
pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugin(InputManagerPlugin::<Actions>::default())
            .add_startup_system(toggle_on_start)
            .add_system(toggle_mouse_capture);
    }
}

#[derive(Actionlike, Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Player actions. Looking around uses discrete directions so the same bindings work on a pad's
/// d-pad and on the arrow keys.
pub enum Actions {
    Move,
    LookLeft,
    LookRight,
    LookUp,
    LookDown,
    FirePrimary,
    FireSecondary,
    Grab,
}

pub fn default_input_map() -> InputMap<Actions> {
    let mut map = InputMap::default();
    map.insert(VirtualDPad::wasd(), Actions::Move)
        .insert(DualAxis::left_stick(), Actions::Move)
        .insert(KeyCode::Left, Actions::LookLeft)
        .insert(KeyCode::Right, Actions::LookRight)
        .insert(KeyCode::Up, Actions::LookUp)
        .insert(KeyCode::Down, Actions::LookDown)
        .insert(GamepadButtonType::DPadLeft, Actions::LookLeft)
        .insert(GamepadButtonType::DPadRight, Actions::LookRight)
        .insert(GamepadButtonType::DPadUp, Actions::LookUp)
        .insert(GamepadButtonType::DPadDown, Actions::LookDown)
        .insert(MouseButton::Left, Actions::FirePrimary)
        .insert(GamepadButtonType::RightTrigger2, Actions::FirePrimary)
        .insert(MouseButton::Right, Actions::FireSecondary)
        .insert(GamepadButtonType::LeftTrigger2, Actions::FireSecondary)
        .insert(KeyCode::E, Actions::Grab)
        .insert(GamepadButtonType::West, Actions::Grab);
    map
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
/// The state of one controller for a single simulation tick.
pub struct InputSnapshot {
    /// `x` strafes right, `y` moves forward. Both in `[-1, 1]`.
    pub move_axes: Vec2,
    pub look_left: bool,
    pub look_right: bool,
    pub look_up: bool,
    pub look_down: bool,
    /// Fire requests for slot 0 and 1, only set on the tick the button went down.
    pub fire: [bool; 2],
    pub grab: bool,
}

impl InputSnapshot {
    pub fn from_action_state(state: &ActionState<Actions>) -> InputSnapshot {
        let move_axes = state
            .axis_pair(Actions::Move)
            .map(|axes| axes.xy().clamp(Vec2::NEG_ONE, Vec2::ONE))
            .unwrap_or_default();
        InputSnapshot {
            move_axes,
            look_left: state.pressed(Actions::LookLeft),
            look_right: state.pressed(Actions::LookRight),
            look_up: state.pressed(Actions::LookUp),
            look_down: state.pressed(Actions::LookDown),
            fire: [
                state.just_pressed(Actions::FirePrimary),
                state.just_pressed(Actions::FireSecondary),
            ],
            grab: state.just_pressed(Actions::Grab),
        }
    }

    /// Fold a newer frame into this one. Held inputs take the newest value, presses are kept
    /// until consumed so a tick never misses one.
    pub fn latch(&mut self, newer: &InputSnapshot) {
        self.move_axes = newer.move_axes;
        self.look_left = newer.look_left;
        self.look_right = newer.look_right;
        self.look_up = newer.look_up;
        self.look_down = newer.look_down;
        self.fire[0] |= newer.fire[0];
        self.fire[1] |= newer.fire[1];
        self.grab |= newer.grab;
    }

    /// Hand the snapshot to a simulation tick, clearing the presses it consumes.
    pub fn take(&mut self) -> InputSnapshot {
        let snapshot = *self;
        self.fire = [false; 2];
        self.grab = false;
        snapshot
    }
}

fn toggle_on_start(mut windows: ResMut<Windows>) {
    match windows.get_primary_mut() {
        Some(window) => {
            window.set_cursor_visibility(false);
            window.set_cursor_grab_mode(bevy::window::CursorGrabMode::Locked);
        }
        None => warn!("No primary window, cursor left as is"),
    }
}

fn toggle_mouse_capture(mut windows: ResMut<Windows>, tab_input: Res<Input<KeyCode>>) {
    if !tab_input.just_pressed(KeyCode::Tab) {
        return;
    }
    if let Some(window) = windows.get_primary_mut() {
        let locked = window.cursor_grab_mode() != bevy::window::CursorGrabMode::None;
        window.set_cursor_visibility(locked);
        window.set_cursor_grab_mode(if locked {
            bevy::window::CursorGrabMode::None
        } else {
            bevy::window::CursorGrabMode::Locked
        });
    }
}

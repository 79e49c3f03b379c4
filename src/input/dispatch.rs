//! Scoped input bindings
//!
//! Every binding belongs to a tier: the scope of one overlay, the view
//! (active only while no overlay owns input), or the global tier which is
//! always live. When several bindings match, the overlay scope wins over the
//! view, and the view over global.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{ButtonId, ButtonLatches, EncoderId, InputEvent, MACRO_COUNT};
use crate::overlay::{AuthorityResolver, OverlayKind, ScopeId};
use crate::protocol::ItemToggle;

/// Which edge of which control a binding reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "edge", rename_all = "snake_case")]
pub enum Trigger {
    Press { button: ButtonId },
    Release { button: ButtonId },
    Turn { encoder: EncoderId },
}

/// Tier a binding lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BindingScope {
    Global,
    View,
    Scope(ScopeId),
}

impl BindingScope {
    pub fn overlay(kind: OverlayKind) -> Self {
        BindingScope::Scope(kind.default_scope())
    }
}

impl TryFrom<String> for BindingScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "global" => Ok(BindingScope::Global),
            "view" => Ok(BindingScope::View),
            other => {
                if let Some(kind) = OverlayKind::from_name(other) {
                    return Ok(BindingScope::overlay(kind));
                }
                other
                    .strip_prefix("scope:")
                    .and_then(|n| n.parse().ok())
                    .map(|n| BindingScope::Scope(ScopeId(n)))
                    .ok_or_else(|| format!("unknown binding scope '{}'", value))
            }
        }
    }
}

impl From<BindingScope> for String {
    fn from(scope: BindingScope) -> Self {
        match scope {
            BindingScope::Global => "global".to_string(),
            BindingScope::View => "view".to_string(),
            BindingScope::Scope(id) => OverlayKind::ALL
                .iter()
                .find(|k| k.default_scope() == id)
                .map(|k| k.name().to_string())
                .unwrap_or_else(|| format!("scope:{}", id.0)),
        }
    }
}

/// What a binding asks the controller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputAction {
    /// Show a selector, optionally stacked on the current one
    OpenSelector {
        overlay: OverlayKind,
        #[serde(default)]
        stack: bool,
    },
    /// Move the cursor of the current selector by the encoder delta
    Navigate,
    /// Select the item under the cursor
    Confirm {
        #[serde(default)]
        close: bool,
    },
    /// Open the children of the expandable device under the cursor; other
    /// rows are selected like `confirm`
    Dive,
    /// Close the current selector without selecting
    Cancel,
    /// Toggle an attribute of the item under the cursor
    Toggle { toggle: ItemToggle },
    /// Edit a parameter slot by the encoder delta
    AdjustParameter { slot: usize },
    /// Grab or let go of a parameter slot
    TouchParameter { slot: usize, touched: bool },
    /// Hand every parameter slot back to its automation
    RestoreAutomation,
    /// Drop every automation override in the project
    ResetAutomationOverrides,
    NextView,
    PreviousView,
}

/// One entry of the binding table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub trigger: Trigger,
    pub scope: BindingScope,
    pub action: InputAction,
    /// Press arms the button and swallows its release
    #[serde(default)]
    pub latch: bool,
}

impl Binding {
    fn new(trigger: Trigger, scope: BindingScope, action: InputAction) -> Self {
        Self {
            trigger,
            scope,
            action,
            latch: false,
        }
    }

    fn latching(mut self) -> Self {
        self.latch = true;
        self
    }
}

/// Action chosen for an input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoutedAction {
    pub action: InputAction,
    pub scope: BindingScope,
    /// Encoder detents (0 for buttons)
    pub delta: i32,
}

/// Factory layout of the controller
pub fn default_bindings() -> Vec<Binding> {
    use BindingScope::View;
    use InputAction::*;

    let press = |button| Trigger::Press { button };
    let release = |button| Trigger::Release { button };
    let turn = |encoder| Trigger::Turn { encoder };

    let mut bindings = vec![
        // View: latching buttons open the selectors
        Binding::new(
            press(ButtonId::LeftCenter),
            View,
            OpenSelector {
                overlay: OverlayKind::DeviceSelector,
                stack: false,
            },
        )
        .latching(),
        Binding::new(
            press(ButtonId::LeftBottom),
            View,
            OpenSelector {
                overlay: OverlayKind::PageSelector,
                stack: false,
            },
        )
        .latching(),
        Binding::new(
            press(ButtonId::Opt),
            View,
            OpenSelector {
                overlay: OverlayKind::ViewSelector,
                stack: false,
            },
        )
        .latching(),
        Binding::new(turn(EncoderId::Opt), View, NextView),
        Binding::new(release(ButtonId::Nav), View, RestoreAutomation),
        Binding::new(release(ButtonId::BottomCenter), View, ResetAutomationOverrides),
    ];

    // Encoder caps are touch buttons
    for n in 1..=MACRO_COUNT {
        let slot = usize::from(n - 1);
        bindings.extend([
            Binding::new(turn(EncoderId::Macro(n)), View, AdjustParameter { slot }),
            Binding::new(
                press(ButtonId::Macro(n)),
                View,
                TouchParameter {
                    slot,
                    touched: true,
                },
            ),
            Binding::new(
                release(ButtonId::Macro(n)),
                View,
                TouchParameter {
                    slot,
                    touched: false,
                },
            ),
        ]);
    }

    // Device selector
    let device = BindingScope::overlay(OverlayKind::DeviceSelector);
    bindings.extend([
        Binding::new(turn(EncoderId::Nav), device, Navigate),
        Binding::new(release(ButtonId::Nav), device, Dive),
        Binding::new(release(ButtonId::LeftCenter), device, Confirm { close: true }),
        Binding::new(release(ButtonId::LeftTop), device, Cancel),
        Binding::new(
            release(ButtonId::BottomCenter),
            device,
            Toggle {
                toggle: ItemToggle::DeviceEnabled,
            },
        ),
        Binding::new(
            press(ButtonId::BottomLeft),
            device,
            OpenSelector {
                overlay: OverlayKind::TrackSelector,
                stack: true,
            },
        )
        .latching(),
    ]);

    // Track selector, usually stacked on the device selector
    let track = BindingScope::overlay(OverlayKind::TrackSelector);
    bindings.extend([
        Binding::new(turn(EncoderId::Nav), track, Navigate),
        Binding::new(release(ButtonId::Nav), track, Confirm { close: false }),
        Binding::new(release(ButtonId::BottomLeft), track, Confirm { close: true }),
        Binding::new(release(ButtonId::LeftTop), track, Cancel),
        Binding::new(
            release(ButtonId::BottomCenter),
            track,
            Toggle {
                toggle: ItemToggle::TrackMute,
            },
        ),
        Binding::new(
            release(ButtonId::BottomRight),
            track,
            Toggle {
                toggle: ItemToggle::TrackSolo,
            },
        ),
    ]);

    // Page selector
    let page = BindingScope::overlay(OverlayKind::PageSelector);
    bindings.extend([
        Binding::new(turn(EncoderId::Nav), page, Navigate),
        Binding::new(release(ButtonId::LeftBottom), page, Confirm { close: true }),
        Binding::new(release(ButtonId::Nav), page, Confirm { close: true }),
        Binding::new(release(ButtonId::LeftTop), page, Cancel),
    ]);

    // View selector
    let view = BindingScope::overlay(OverlayKind::ViewSelector);
    bindings.extend([
        Binding::new(turn(EncoderId::Nav), view, Navigate),
        Binding::new(turn(EncoderId::Opt), view, Navigate),
        Binding::new(release(ButtonId::Opt), view, Confirm { close: true }),
        Binding::new(release(ButtonId::Nav), view, Confirm { close: true }),
        Binding::new(release(ButtonId::LeftTop), view, Cancel),
    ]);

    bindings
}

/// Turns raw input events into actions under the current authority
#[derive(Debug, Clone)]
pub struct InputRouter {
    bindings: Vec<Binding>,
    latches: ButtonLatches,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new(default_bindings())
    }
}

impl InputRouter {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self {
            bindings,
            latches: ButtonLatches::new(),
        }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Swap the binding table; latch state is dropped with it
    pub fn set_bindings(&mut self, bindings: Vec<Binding>) {
        self.bindings = bindings;
        self.latches.clear();
    }

    pub fn latches(&self) -> &ButtonLatches {
        &self.latches
    }

    pub fn latches_mut(&mut self) -> &mut ButtonLatches {
        &mut self.latches
    }

    /// Best live binding for `trigger`
    fn resolve(&self, trigger: Trigger, authority: &AuthorityResolver<'_>) -> Option<Binding> {
        self.bindings
            .iter()
            .filter(|b| b.trigger == trigger)
            .filter_map(|b| authority.priority(b.scope).map(|p| (p, b)))
            .min_by_key(|(p, _)| *p)
            .map(|(_, b)| *b)
    }

    /// Route one event; returns the action to run, if any
    pub fn route(&mut self, event: InputEvent, authority: &AuthorityResolver<'_>) -> Option<RoutedAction> {
        match event {
            InputEvent::Press(button) => {
                if self.latches.disarm(button) {
                    debug!("Latch on {} released by press", button);
                    return None;
                }
                let binding = self.resolve(Trigger::Press { button }, authority)?;
                if binding.latch {
                    self.latches.arm(button);
                }
                Some(RoutedAction {
                    action: binding.action,
                    scope: binding.scope,
                    delta: 0,
                })
            }
            InputEvent::Release(button) => {
                if self.latches.take_swallowed_release(button) {
                    trace!("Release of latched {} swallowed", button);
                    return None;
                }
                let binding = self.resolve(Trigger::Release { button }, authority)?;
                Some(RoutedAction {
                    action: binding.action,
                    scope: binding.scope,
                    delta: 0,
                })
            }
            InputEvent::Turn(encoder, delta) => {
                if delta == 0 {
                    return None;
                }
                let binding = self.resolve(Trigger::Turn { encoder }, authority)?;
                Some(RoutedAction {
                    action: binding.action,
                    scope: binding.scope,
                    delta,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::LatchControl;
    use crate::overlay::OverlayStack;

    fn overlays() -> OverlayStack {
        OverlayStack::with_latches(OverlayKind::default_latch)
    }

    #[test]
    fn test_latching_press_swallows_release() {
        let overlays = overlays();
        let mut router = InputRouter::default();
        let authority = AuthorityResolver::new(&overlays);

        let routed = router
            .route(InputEvent::Press(ButtonId::LeftCenter), &authority)
            .unwrap();
        assert_eq!(
            routed.action,
            InputAction::OpenSelector {
                overlay: OverlayKind::DeviceSelector,
                stack: false
            }
        );
        assert!(router.latches().is_armed(ButtonId::LeftCenter));
        assert_eq!(router.route(InputEvent::Release(ButtonId::LeftCenter), &authority), None);
    }

    #[test]
    fn test_overlay_scope_suppresses_view_bindings() {
        let mut overlays = overlays();
        let mut router = InputRouter::default();
        overlays
            .show(OverlayKind::DeviceSelector, false, router.latches_mut())
            .unwrap();
        let authority = AuthorityResolver::new(&overlays);

        // Macro encoders belong to the view and are muted under a selector
        assert_eq!(router.route(InputEvent::Turn(EncoderId::Macro(1), 2), &authority), None);

        let routed = router
            .route(InputEvent::Turn(EncoderId::Nav, -1), &authority)
            .unwrap();
        assert_eq!(routed.action, InputAction::Navigate);
        assert_eq!(routed.delta, -1);
        assert_eq!(routed.scope, BindingScope::overlay(OverlayKind::DeviceSelector));
    }

    #[test]
    fn test_stacked_overlay_owns_shared_controls() {
        let mut overlays = overlays();
        let mut router = InputRouter::default();
        overlays
            .show(OverlayKind::DeviceSelector, false, router.latches_mut())
            .unwrap();
        overlays
            .show(OverlayKind::TrackSelector, true, router.latches_mut())
            .unwrap();
        let authority = AuthorityResolver::new(&overlays);

        let routed = router
            .route(InputEvent::Release(ButtonId::BottomCenter), &authority)
            .unwrap();
        assert_eq!(
            routed.action,
            InputAction::Toggle {
                toggle: ItemToggle::TrackMute
            }
        );
    }

    #[test]
    fn test_global_tier_is_lowest_priority() {
        let mut bindings = default_bindings();
        bindings.push(Binding::new(
            Trigger::Turn { encoder: EncoderId::Nav },
            BindingScope::Global,
            InputAction::NextView,
        ));
        let mut router = InputRouter::new(bindings);
        let mut overlays = overlays();

        // No overlay: only the global binding matches
        let routed = router
            .route(InputEvent::Turn(EncoderId::Nav, 1), &AuthorityResolver::new(&overlays))
            .unwrap();
        assert_eq!(routed.action, InputAction::NextView);

        // Under a selector the scoped binding wins
        overlays
            .show(OverlayKind::PageSelector, false, router.latches_mut())
            .unwrap();
        let routed = router
            .route(InputEvent::Turn(EncoderId::Nav, 1), &AuthorityResolver::new(&overlays))
            .unwrap();
        assert_eq!(routed.action, InputAction::Navigate);
    }

    #[test]
    fn test_second_press_disarms_then_release_dispatches() {
        let mut overlays = overlays();
        let mut router = InputRouter::default();

        router.route(InputEvent::Press(ButtonId::LeftCenter), &AuthorityResolver::new(&overlays));
        router.route(InputEvent::Release(ButtonId::LeftCenter), &AuthorityResolver::new(&overlays));
        overlays
            .show(OverlayKind::DeviceSelector, false, router.latches_mut())
            .unwrap();

        let authority = AuthorityResolver::new(&overlays);
        assert_eq!(router.route(InputEvent::Press(ButtonId::LeftCenter), &authority), None);
        assert!(!router.latches().is_armed(ButtonId::LeftCenter));

        let routed = router
            .route(InputEvent::Release(ButtonId::LeftCenter), &authority)
            .unwrap();
        assert_eq!(routed.action, InputAction::Confirm { close: true });
    }

    #[test]
    fn test_released_latch_lets_press_reopen() {
        let overlays = overlays();
        let mut router = InputRouter::default();
        let authority = AuthorityResolver::new(&overlays);

        router.route(InputEvent::Press(ButtonId::LeftCenter), &authority);
        assert!(router.latches_mut().release_latch(ButtonId::LeftCenter));

        // Release after cleanup is not swallowed and has no view binding
        assert_eq!(router.route(InputEvent::Release(ButtonId::LeftCenter), &authority), None);
        assert!(router
            .route(InputEvent::Press(ButtonId::LeftCenter), &authority)
            .is_some());
    }

    #[test]
    fn test_macro_caps_touch_in_view_only() {
        let mut overlays = overlays();
        let mut router = InputRouter::default();

        let routed = router
            .route(InputEvent::Press(ButtonId::Macro(3)), &AuthorityResolver::new(&overlays))
            .unwrap();
        assert_eq!(
            routed.action,
            InputAction::TouchParameter {
                slot: 2,
                touched: true
            }
        );
        let routed = router
            .route(InputEvent::Release(ButtonId::Macro(3)), &AuthorityResolver::new(&overlays))
            .unwrap();
        assert_eq!(
            routed.action,
            InputAction::TouchParameter {
                slot: 2,
                touched: false
            }
        );

        // Nav release restores automation only while no selector is open
        let routed = router
            .route(InputEvent::Release(ButtonId::Nav), &AuthorityResolver::new(&overlays))
            .unwrap();
        assert_eq!(routed.action, InputAction::RestoreAutomation);

        overlays
            .show(OverlayKind::DeviceSelector, false, router.latches_mut())
            .unwrap();
        let authority = AuthorityResolver::new(&overlays);
        assert_eq!(router.route(InputEvent::Press(ButtonId::Macro(3)), &authority), None);
        let routed = router
            .route(InputEvent::Release(ButtonId::Nav), &authority)
            .unwrap();
        assert_eq!(routed.action, InputAction::Dive);
    }

    #[test]
    fn test_bindings_from_yaml() {
        let yaml = r#"
- trigger: { edge: press, button: macro_2 }
  scope: view
  action: { type: adjust_parameter, slot: 1 }
- trigger: { edge: release, button: left_top }
  scope: device_selector
  action: { type: cancel }
- trigger: { edge: turn, encoder: opt }
  scope: global
  latch: false
  action: { type: open_selector, overlay: track_selector, stack: true }
"#;
        let bindings: Vec<Binding> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(bindings.len(), 3);
        assert_eq!(
            bindings[0].trigger,
            Trigger::Press {
                button: ButtonId::Macro(2)
            }
        );
        assert_eq!(bindings[1].scope, BindingScope::overlay(OverlayKind::DeviceSelector));
        assert_eq!(
            bindings[2].action,
            InputAction::OpenSelector {
                overlay: OverlayKind::TrackSelector,
                stack: true
            }
        );
        assert!(serde_yaml::from_str::<Vec<Binding>>("- trigger: { edge: press, button: shift }\n  scope: view\n  action: { type: cancel }\n").is_err());
    }
}

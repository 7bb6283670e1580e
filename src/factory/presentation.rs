//! Steps que apresentam telas dentro de um container de navegação.

use std::sync::Arc;

use tracing::info;

use crate::presentation::{self, NavigationContainer, Screen, ScreenPresenter};
use crate::step::{ConfigurationCallback, Step};

/// Presentation step constructors bound to one presenter.
#[derive(Clone)]
pub struct PresentationSteps {
    presenter: Arc<dyn ScreenPresenter>,
}

impl PresentationSteps {
    pub(super) fn new(presenter: Arc<dyn ScreenPresenter>) -> Self {
        Self { presenter }
    }

    /// Instantiates `class`, wraps it in a navigation container and presents
    /// it. Bar classes left as `None` fall back to the process-wide defaults
    /// current when the step runs, not when it is built.
    pub fn step_to_present_screen(
        &self,
        class: impl Into<String>,
        navigation_bar_class: Option<&str>,
        toolbar_class: Option<&str>,
        configure: Option<ConfigurationCallback<Screen>>,
    ) -> Step {
        let presenter = Arc::clone(&self.presenter);
        let class = class.into();
        let navigation_bar_class = navigation_bar_class.map(str::to_string);
        let toolbar_class = toolbar_class.map(str::to_string);

        let mut description = format!("Present screen '{}'", class);
        if let Some(bar) = &navigation_bar_class {
            description.push_str(&format!(" with navigation bar '{}'", bar));
        }
        if let Some(toolbar) = &toolbar_class {
            description.push_str(&format!(" with toolbar '{}'", toolbar));
        }

        Step::new(description, move || async move {
            let mut screen = presenter.instantiate(&class)?;
            let container_bar = navigation_bar_class.or_else(presentation::default_navigation_bar_class);
            let container_toolbar = toolbar_class.or_else(presentation::default_toolbar_class);
            if let Some(configure) = configure {
                configure(&mut screen);
            }
            info!(
                screen = %class,
                navigation_bar = container_bar.as_deref().unwrap_or("none"),
                toolbar = container_toolbar.as_deref().unwrap_or("none"),
                "Presenting screen"
            );
            presenter
                .present(NavigationContainer {
                    navigation_bar_class: container_bar,
                    toolbar_class: container_toolbar,
                    root: screen,
                })
                .await
        })
    }
}

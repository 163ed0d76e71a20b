use crate::{
    context::{
        ATTR_BROWSER, ATTR_JUNK_X, ATTR_JUNK_Y, ATTR_JUNK_Z, ATTR_MOBILE, ATTR_OS, ATTR_PLATFORM,
        Context, ContextValue, user_agent,
    },
    selector::RandomSelector,
};

const JUNK_X_VALUES: &[&str] = &["x1", "x2", "x3", "x4"];
const JUNK_Y_VALUES: &[&str] = &["y1", "y2"];
const JUNK_Z_VALUES: &[&str] = &["z1", "z2", "z3", "z4", "z5", "z6", "z7", "z8"];

/// Builds the per-request context from the user-agent string.
///
/// With decoy attributes enabled, three irrelevant attributes are appended so
/// the decision service's learner can later be audited for ignoring them.
#[derive(Clone)]
pub struct ContextBuilder {
    decoy_context: bool,
    selector: RandomSelector,
}

impl ContextBuilder {
    pub fn new(decoy_context: bool, selector: RandomSelector) -> Self {
        Self {
            decoy_context,
            selector,
        }
    }

    pub fn build(&self, user_agent: &str) -> Context {
        let info = user_agent::parse(user_agent);
        let mut attributes: Vec<(&str, ContextValue)> = vec![
            (ATTR_MOBILE, info.mobile.into()),
            (ATTR_PLATFORM, info.platform.into()),
            (ATTR_OS, info.os.into()),
            (ATTR_BROWSER, info.browser.into()),
        ];

        if self.decoy_context {
            for (name, values) in [
                (ATTR_JUNK_X, JUNK_X_VALUES),
                (ATTR_JUNK_Y, JUNK_Y_VALUES),
                (ATTR_JUNK_Z, JUNK_Z_VALUES),
            ] {
                if let Some(value) = self.selector.pick(values) {
                    attributes.push((name, (*value).into()));
                }
            }
        }

        Context::from_attributes(attributes)
    }
}

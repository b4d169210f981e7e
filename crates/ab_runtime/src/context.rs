use crate::config_cache::ConfigCache;
use crate::exposure::ExposureTracker;
use crate::host::Host;
use crate::identity::IdentityStore;
use crate::interaction::InteractionTracker;
use crate::page_context::PageContextProvider;
use crate::settings::RuntimeSettings;
use crate::slot::SlotIndex;
use crate::tracking::Tracker;
use crate::variant::VariantResolver;
use std::cell::RefCell;
use std::rc::Rc;

/// Every cache, flag and service of one page session, built once at startup.
pub struct SessionContext {
    pub host: Rc<Host>,
    pub settings: Rc<RuntimeSettings>,
    pub identity: Rc<IdentityStore>,
    pub page: Rc<PageContextProvider>,
    pub config: Rc<ConfigCache>,
    pub variants: Rc<VariantResolver>,
    pub tracker: Rc<Tracker>,
    pub exposure: ExposureTracker,
    pub interaction: InteractionTracker,
    pub slots: RefCell<SlotIndex>,
}

impl SessionContext {
    pub fn new(host: Rc<Host>, settings: RuntimeSettings) -> Self {
        let settings = Rc::new(settings);
        let identity = Rc::new(IdentityStore::new(Rc::clone(&host), &settings));
        let page = Rc::new(PageContextProvider::new(Rc::clone(&host), &settings));
        let config = Rc::new(ConfigCache::new(
            Rc::clone(&host),
            Rc::clone(&settings),
            Rc::clone(&identity),
        ));
        let variants = Rc::new(VariantResolver::new(
            Rc::clone(&host),
            Rc::clone(&settings),
            Rc::clone(&identity),
        ));
        let tracker = Rc::new(Tracker::new(
            Rc::clone(&host),
            Rc::clone(&settings),
            Rc::clone(&identity),
            Rc::clone(&page),
            Rc::clone(&variants),
            Rc::clone(&config),
        ));
        let exposure = ExposureTracker::new(
            Rc::clone(&host),
            Rc::clone(&settings),
            Rc::clone(&identity),
            Rc::clone(&tracker),
        );
        let interaction = InteractionTracker::new(Rc::clone(&host), Rc::clone(&tracker));
        Self {
            host,
            settings,
            identity,
            page,
            config,
            variants,
            tracker,
            exposure,
            interaction,
            slots: RefCell::new(SlotIndex::default()),
        }
    }
}

use std::sync::Arc;

use crate::{
    config::AppConfig,
    notify::{LogNotifier, Notifier, SmtpNotifier},
    payment::{MockPaymentGateway, PaymentGateway},
    repositories::{FavoriteRepository, OrderRepository, ProductRepository, Repositories, UserRepository},
    storage::StorageAdapter,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorageAdapter>,
    pub users: UserRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub favorites: FavoriteRepository,
    pub notifier: Arc<dyn Notifier>,
    pub payments: Arc<dyn PaymentGateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn StorageAdapter>) -> Self {
        let notifier: Arc<dyn Notifier> = match &config.smtp {
            Some(smtp) => match SmtpNotifier::new(smtp) {
                Ok(notifier) => Arc::new(notifier),
                Err(err) => {
                    tracing::error!(error = %err, host = %smtp.host, "smtp disabled");
                    Arc::new(LogNotifier)
                }
            },
            None => Arc::new(LogNotifier),
        };
        let payments = Arc::new(MockPaymentGateway::new(config.payment_mode));
        let Repositories {
            users,
            products,
            orders,
            favorites,
        } = Repositories::new(store.clone());

        Self {
            store,
            users,
            products,
            orders,
            favorites,
            notifier,
            payments,
            config: Arc::new(config),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = payments;
        self
    }
}

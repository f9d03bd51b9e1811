use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    DepositSettledEvent,
    EventHandler,
    EventProducer,
    Handler,
    OrderCancelledEvent,
    OrderPurchasedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_purchased_producer: Vec<EventProducer<OrderPurchasedEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
    pub deposit_settled_producer: Vec<EventProducer<DepositSettledEvent>>,
}

impl EventProducers {
    pub async fn publish_order_purchased(&self, event: OrderPurchasedEvent) {
        for producer in &self.order_purchased_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_cancelled(&self, event: OrderCancelledEvent) {
        for producer in &self.order_cancelled_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_deposit_settled(&self, event: DepositSettledEvent) {
        for producer in &self.deposit_settled_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_purchased: Option<EventHandler<OrderPurchasedEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
    pub on_deposit_settled: Option<EventHandler<DepositSettledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_order_purchased = hooks.on_order_purchased.map(|f| EventHandler::new(buffer_size, f));
        let on_order_cancelled = hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f));
        let on_deposit_settled = hooks.on_deposit_settled.map(|f| EventHandler::new(buffer_size, f));
        Self { on_order_purchased, on_order_cancelled, on_deposit_settled }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_purchased {
            result.order_purchased_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_deposit_settled {
            result.deposit_settled_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_purchased {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_order_cancelled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_deposit_settled {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

type BoxedHook = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_purchased: Option<Handler<OrderPurchasedEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
    pub on_deposit_settled: Option<Handler<DepositSettledEvent>>,
}

impl EventHooks {
    pub fn on_order_purchased<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderPurchasedEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_purchased = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCancelledEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }

    pub fn on_deposit_settled<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(DepositSettledEvent) -> BoxedHook) + Send + Sync + 'static {
        self.on_deposit_settled = Some(Arc::new(f));
        self
    }
}

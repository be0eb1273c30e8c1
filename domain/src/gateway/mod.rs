pub mod ms_graph;
